//! What the time-stepper needs from a network.

use crate::error::SimResult;
use hn_aml::Model;
use hn_network::{ModelContext, TimeOptions, WaterNetwork};
use hn_results::StepSnapshot;

/// A network whose physics can be rebuilt as an algebraic model at any
/// instant and which absorbs solved models back into its state.
pub trait HydraulicNetwork {
    /// Whatever `build_model` needs to remember to read results back.
    type Context;

    fn name(&self) -> &str;

    fn time_options(&self) -> TimeOptions;

    /// Simulated time the network is at, s.
    fn sim_time(&self) -> f64;

    fn set_sim_time(&mut self, time_s: f64);

    /// Fresh model of the network at `time_s`, starting from current state.
    fn build_model(&self, time_s: f64) -> SimResult<(Model, Self::Context)>;

    /// Absorb a solved model and describe the resulting state.
    fn store_results(
        &mut self,
        model: &Model,
        context: &Self::Context,
        time_s: f64,
    ) -> SimResult<StepSnapshot>;
}

impl HydraulicNetwork for WaterNetwork {
    type Context = ModelContext;

    fn name(&self) -> &str {
        WaterNetwork::name(self)
    }

    fn time_options(&self) -> TimeOptions {
        *WaterNetwork::time_options(self)
    }

    fn sim_time(&self) -> f64 {
        WaterNetwork::sim_time(self)
    }

    fn set_sim_time(&mut self, time_s: f64) {
        WaterNetwork::set_sim_time(self, time_s);
    }

    fn build_model(&self, time_s: f64) -> SimResult<(Model, ModelContext)> {
        Ok(hn_network::build_hydraulic_model(self, time_s)?)
    }

    fn store_results(
        &mut self,
        model: &Model,
        context: &ModelContext,
        _time_s: f64,
    ) -> SimResult<StepSnapshot> {
        Ok(hn_network::store_results(self, model, context)?)
    }
}
