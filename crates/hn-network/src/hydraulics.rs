//! Demand-driven hydraulic equations for one instant.
//!
//! Every node gets a head unknown and every open pipe a flow unknown. Fixed
//! heads (reservoirs, tanks) are pinned by equality constraints rather than
//! left out, so all nodes are handled the same way when results are read
//! back. Pipe head loss lives in a named expression per pipe that the
//! head-loss constraint refers to.

use crate::error::NetworkResult;
use crate::network::{HeadLossApprox, NodeKind, Pipe, WaterNetwork, base_demand_m3s};
use hn_aml::{Condition, Expr, Model};
use hn_core::constants::{G0_MPS2, HW_EXPONENT, HW_K_SI};
use hn_core::{ExprId, LinkId, NodeId, ParamId, VarId};
use tracing::debug;
use uom::si::length::meter;

/// Below this flow (m^3/s) the piecewise head loss is linear in flow.
pub const HW_Q_LINEAR: f64 = 2e-4;

/// Flow guess for pipes that carried no flow at the last step.
const FLOW_GUESS: f64 = 1e-3;

/// Which model objects belong to which network element.
#[derive(Debug, Clone)]
pub struct ModelContext {
    /// Simulated time the model was built for, s.
    pub time_s: f64,
    head: Vec<VarId>,
    /// Demand parameter per node (junctions only)
    demand: Vec<Option<ParamId>>,
    /// Head parameter per node (reservoirs and tanks only)
    head_bc: Vec<Option<ParamId>>,
    flow: Vec<Option<VarId>>,
    resistance: Vec<ParamId>,
    loss: Vec<ExprId>,
}

impl ModelContext {
    pub fn head_var(&self, node: NodeId) -> Option<VarId> {
        self.head.get(node.slot()).copied()
    }

    /// `None` for closed pipes.
    pub fn flow_var(&self, link: LinkId) -> Option<VarId> {
        self.flow.get(link.slot()).copied().flatten()
    }

    pub fn demand_param(&self, node: NodeId) -> Option<ParamId> {
        self.demand.get(node.slot()).copied().flatten()
    }

    pub fn head_param(&self, node: NodeId) -> Option<ParamId> {
        self.head_bc.get(node.slot()).copied().flatten()
    }

    pub fn resistance_param(&self, link: LinkId) -> Option<ParamId> {
        self.resistance.get(link.slot()).copied()
    }

    pub fn loss_expr(&self, link: LinkId) -> Option<ExprId> {
        self.loss.get(link.slot()).copied()
    }
}

/// Hazen-Williams resistance `r` in `h = r q^1.852` (SI).
pub fn hw_resistance(pipe: &Pipe) -> f64 {
    let length = pipe.props.length.get::<meter>();
    let diameter = pipe.props.diameter.get::<meter>();
    HW_K_SI * length / (pipe.props.roughness.powf(HW_EXPONENT) * diameter.powf(4.871))
}

/// Minor-loss coefficient `m` in `h = m q |q|` (SI).
pub fn minor_loss_coefficient(pipe: &Pipe) -> f64 {
    let diameter = pipe.props.diameter.get::<meter>();
    8.0 * pipe.props.minor_loss / (G0_MPS2 * std::f64::consts::PI.powi(2) * diameter.powi(4))
}

/// Hazen-Williams head loss as a function of flow `q`.
pub fn friction_loss(approx: HeadLossApprox, r: Expr, q: Expr) -> Expr {
    match approx {
        HeadLossApprox::Piecewise => Expr::piecewise([
            (
                q.clone().gt(HW_Q_LINEAR),
                r.clone() * q.clone().pow(HW_EXPONENT),
            ),
            (
                q.clone().lt(-HW_Q_LINEAR),
                -(r.clone() * (-q.clone()).pow(HW_EXPONENT)),
            ),
            (
                Condition::Always,
                r * HW_Q_LINEAR.powf(HW_EXPONENT - 1.0) * q,
            ),
        ]),
        HeadLossApprox::Smooth => r * q.clone() * q.abs().pow(HW_EXPONENT - 1.0),
    }
}

/// Build the hydraulic model of `network` at `time_s`.
///
/// Heads and flows start from the network's current state. A closed pipe
/// gets no flow unknown; its head-loss constraint still refers to one, which
/// leaves the constraint unresolvable and for the translator to drop.
pub fn build_hydraulic_model(
    network: &WaterNetwork,
    time_s: f64,
) -> NetworkResult<(Model, ModelContext)> {
    let mut model = Model::new(network.name());
    let n_nodes = network.nodes.len();
    let n_pipes = network.pipes.len();

    let mut demand = vec![None; n_nodes];
    let mut head_bc = vec![None; n_nodes];
    for node in &network.nodes {
        match &node.kind {
            NodeKind::Junction(j) => {
                let value = base_demand_m3s(j) * network.multiplier(j.pattern.as_deref(), time_s);
                demand[node.id.slot()] =
                    Some(model.add_param(format!("demand[{}]", node.name), value)?);
            }
            NodeKind::Reservoir(r) => {
                let value = r.base_head.get::<meter>()
                    * network.multiplier(r.pattern.as_deref(), time_s);
                head_bc[node.id.slot()] =
                    Some(model.add_param(format!("head_bc[{}]", node.name), value)?);
            }
            NodeKind::Tank(t) => {
                let value = t.elevation.get::<meter>() + node.level;
                head_bc[node.id.slot()] =
                    Some(model.add_param(format!("head_bc[{}]", node.name), value)?);
            }
        }
    }

    let mut resistance = Vec::with_capacity(n_pipes);
    let mut minor = Vec::with_capacity(n_pipes);
    for pipe in &network.pipes {
        resistance.push(model.add_param(
            format!("hw_resistance[{}]", pipe.name),
            hw_resistance(pipe),
        )?);
        minor.push(model.add_param(
            format!("minor_loss[{}]", pipe.name),
            minor_loss_coefficient(pipe),
        )?);
    }

    let mut head = Vec::with_capacity(n_nodes);
    for node in &network.nodes {
        head.push(model.add_var(format!("head[{}]", node.name), node.head)?);
    }

    let mut flow = vec![None; n_pipes];
    for pipe in network.pipes.iter().filter(|p| p.is_open()) {
        let guess = if pipe.flow == 0.0 { FLOW_GUESS } else { pipe.flow };
        flow[pipe.id.slot()] = Some(model.add_var(format!("flow[{}]", pipe.name), guess)?);
    }

    // Closed pipes point past the last variable.
    let first_unallocated = model.vars().len() as u32;
    let flow_ref = |pipe: &Pipe| -> Expr {
        match flow[pipe.id.slot()] {
            Some(v) => Expr::from(v),
            None => Expr::from(VarId::from_index(first_unallocated + pipe.id.index())),
        }
    };

    let approx = network.hydraulic.headloss;
    let mut loss = Vec::with_capacity(n_pipes);
    for pipe in &network.pipes {
        let q = flow_ref(pipe);
        let r = Expr::from(resistance[pipe.id.slot()]);
        let m = Expr::from(minor[pipe.id.slot()]);
        let expr = friction_loss(approx, r, q.clone()) + m * q.clone() * q.abs();
        loss.push(model.add_expression(format!("loss[{}]", pipe.name), expr)?);
    }

    for node in &network.nodes {
        let h = Expr::from(head[node.id.slot()]);
        match &node.kind {
            NodeKind::Junction(_) => {
                let net_inflow = Expr::sum(network.pipes.iter().filter(|p| p.is_open()).filter_map(
                    |p| {
                        let q = flow_ref(p);
                        if p.end == node.id {
                            Some(q)
                        } else if p.start == node.id {
                            Some(-q)
                        } else {
                            None
                        }
                    },
                ));
                let d = demand[node.id.slot()].map(Expr::from).unwrap_or_else(Expr::zero);
                model.add_constraint(format!("mass_balance[{}]", node.name), net_inflow - d)?;
            }
            NodeKind::Reservoir(_) | NodeKind::Tank(_) => {
                let bc = head_bc[node.id.slot()].map(Expr::from).unwrap_or_else(Expr::zero);
                model.add_constraint(format!("fixed_head[{}]", node.name), h - bc)?;
            }
        }
    }

    for pipe in &network.pipes {
        let h_start = Expr::from(head[pipe.start.slot()]);
        let h_end = Expr::from(head[pipe.end.slot()]);
        let l = Expr::from(loss[pipe.id.slot()]);
        model.add_constraint(format!("headloss[{}]", pipe.name), h_start - h_end - l)?;
    }

    debug!(
        network = network.name(),
        time_s,
        params = model.params().len(),
        vars = model.vars().len(),
        cons = model.cons().len(),
        "built hydraulic model"
    );

    let context = ModelContext {
        time_s,
        head,
        demand,
        head_bc,
        flow,
        resistance,
        loss,
    };
    Ok((model, context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetworkBuilder;
    use crate::network::{Junction, PipeProps, Reservoir};
    use hn_core::{lps, m};

    fn line(closed: bool) -> WaterNetwork {
        let mut b = NetworkBuilder::new("line");
        let r = b.add_reservoir(
            "R",
            Reservoir {
                base_head: m(40.0),
                pattern: None,
            },
        );
        let j = b.add_junction(
            "J",
            Junction {
                elevation: m(10.0),
                base_demand: lps(5.0),
                pattern: Some("p".to_string()),
            },
        );
        b.add_pattern("p", vec![1.0, 2.0]);
        b.add_pipe("P1", r, j, PipeProps::new(m(100.0), m(0.2), 120.0));
        let extra = PipeProps::new(m(50.0), m(0.1), 100.0);
        b.add_pipe("P2", r, j, if closed { extra.closed() } else { extra });
        b.build().unwrap()
    }

    #[test]
    fn model_has_expected_shape() {
        let net = line(false);
        let (model, ctx) = build_hydraulic_model(&net, 0.0).unwrap();

        assert_eq!(model.vars().len(), 4);
        assert_eq!(model.cons().len(), 4);
        assert!(model.constraint_by_name("mass_balance[J]").is_some());
        assert!(model.constraint_by_name("fixed_head[R]").is_some());
        assert!(model.param_by_name("hw_resistance[P1]").is_some());
        let p1 = net.pipe_by_name("P1").unwrap();
        assert!(ctx.flow_var(p1.id).is_some());
        assert!(ctx.loss_expr(p1.id).is_some());
    }

    #[test]
    fn demand_follows_pattern() {
        let net = line(false);
        let (model, _) = build_hydraulic_model(&net, 3600.0).unwrap();
        let d = model.param_by_name("demand[J]").unwrap();
        assert!((model.param_value(d).unwrap() - 0.010).abs() < 1e-12);
    }

    #[test]
    fn closed_pipe_has_no_flow_and_unresolvable_headloss() {
        let net = line(true);
        let (model, ctx) = build_hydraulic_model(&net, 0.0).unwrap();
        let p2 = net.pipe_by_name("P2").unwrap();

        assert!(ctx.flow_var(p2.id).is_none());
        assert_eq!(model.vars().len(), 3);
        let c = model.constraint_by_name("headloss[P2]").unwrap();
        assert!(model.constraint_residual(c).is_err());
        let mb = model.constraint_by_name("mass_balance[J]").unwrap();
        assert!(model.constraint_residual(mb).is_ok());
    }

    #[test]
    fn piecewise_loss_is_continuous_at_linear_threshold() {
        let mut model = Model::new("pw");
        let q = model.add_var("q", HW_Q_LINEAR).unwrap();
        let loss = friction_loss(
            HeadLossApprox::Piecewise,
            Expr::constant(100.0),
            Expr::from(q),
        );
        let at = model.value_of(&loss).unwrap();
        model.set_var_value(q, HW_Q_LINEAR * (1.0 + 1e-9)).unwrap();
        let above = model.value_of(&loss).unwrap();
        assert!((at - above).abs() < 1e-9);

        model.set_var_value(q, -0.05).unwrap();
        let negative = model.value_of(&loss).unwrap();
        model.set_var_value(q, 0.05).unwrap();
        let positive = model.value_of(&loss).unwrap();
        assert!((negative + positive).abs() < 1e-12);
    }

    #[test]
    fn smooth_loss_is_odd() {
        let mut model = Model::new("smooth");
        let q = model.add_var("q", 0.03).unwrap();
        let loss = friction_loss(HeadLossApprox::Smooth, Expr::constant(50.0), Expr::from(q));
        let plus = model.value_of(&loss).unwrap();
        model.set_var_value(q, -0.03).unwrap();
        let minus = model.value_of(&loss).unwrap();
        assert!(plus > 0.0);
        assert!((plus + minus).abs() < 1e-12);
    }
}
