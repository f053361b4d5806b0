//! Writes a solved hydraulic model back into the network.

use crate::error::{NetworkError, NetworkResult};
use crate::hydraulics::ModelContext;
use crate::network::{NodeKind, WaterNetwork};
use hn_aml::Model;
use hn_results::StepSnapshot;
use tracing::debug;
use uom::si::area::square_meter;
use uom::si::length::meter;

fn missing(what: String) -> NetworkError {
    NetworkError::MissingFromModel { what }
}

/// Copy solved heads and flows into `network` and snapshot the result.
///
/// The snapshot describes the network at `context.time_s`. Tank levels are
/// then advanced by the net inflow over one hydraulic step, so the next model
/// starts from the new levels.
pub fn store_results(
    network: &mut WaterNetwork,
    model: &Model,
    context: &ModelContext,
) -> NetworkResult<StepSnapshot> {
    for node in &mut network.nodes {
        let var = context
            .head_var(node.id)
            .ok_or_else(|| missing(format!("head of '{}'", node.name)))?;
        node.head = model.var_value(var)?;
    }
    for pipe in &mut network.pipes {
        pipe.flow = match context.flow_var(pipe.id) {
            Some(var) => model.var_value(var)?,
            None => 0.0,
        };
    }

    let mut demands = Vec::with_capacity(network.nodes.len());
    for node in &network.nodes {
        let demand = match context.demand_param(node.id) {
            Some(p) => model.param_value(p)?,
            None => network.net_inflow(node.id),
        };
        demands.push(demand);
    }

    let mut snapshot = StepSnapshot::new(context.time_s.round() as i64);
    for (node, demand) in network.nodes.iter_mut().zip(demands) {
        node.demand = demand;
        snapshot.set_node("head", &node.name, node.head);
        snapshot.set_node("demand", &node.name, node.demand);
        snapshot.set_node("pressure", &node.name, node.pressure());
    }
    for pipe in &network.pipes {
        snapshot.set_link("flowrate", &pipe.name, pipe.flow);
        snapshot.set_link("velocity", &pipe.name, pipe.velocity());
    }

    for name in &network.hydraulic.tracked_params {
        let p = model
            .param_by_name(name)
            .ok_or_else(|| NetworkError::UnknownElement {
                kind: "parameter",
                name: name.clone(),
            })?;
        snapshot.calibration.insert(name.clone(), model.param_value(p)?);
    }

    advance_tanks(network);
    Ok(snapshot)
}

/// Integrate tank levels over one hydraulic step, clamped to their limits.
fn advance_tanks(network: &mut WaterNetwork) {
    let dt = network.time.hydraulic_timestep_s();
    let inflows: Vec<f64> = network
        .nodes
        .iter()
        .map(|n| match n.kind {
            NodeKind::Tank(_) => network.net_inflow(n.id),
            _ => 0.0,
        })
        .collect();

    for (node, inflow) in network.nodes.iter_mut().zip(inflows) {
        if let NodeKind::Tank(tank) = &node.kind {
            let area = hn_core::circle_area(tank.diameter).get::<square_meter>();
            let level = (node.level + inflow * dt / area)
                .clamp(tank.min_level.get::<meter>(), tank.max_level.get::<meter>());
            debug!(tank = %node.name, from = node.level, to = level, "tank level");
            node.level = level;
            node.head = tank.elevation.get::<meter>() + level;
        }
    }
}
