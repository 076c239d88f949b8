/// XAJ model orchestration.
///
/// - `step()`: one time step
/// - `run()`: a whole forcing series, keeping every flux
/// - `Xaj`: the `Simulator` used by the calibration
use super::params::XajParams;
use super::processes;
use super::state::{InitialState, State};
use crate::traits::{Forcing, Simulator};

/// Fluxes of one time step, depths over the whole basin [mm].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fluxes {
    pub actual_et: f64,
    pub runoff: f64,
    pub surface: f64,
    pub interflow: f64,
    pub groundwater: f64,
    pub tension_water: f64,
    pub free_water: f64,
    pub streamflow: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxesTimeseries {
    pub actual_et: Vec<f64>,
    pub runoff: Vec<f64>,
    pub surface: Vec<f64>,
    pub interflow: Vec<f64>,
    pub groundwater: Vec<f64>,
    pub tension_water: Vec<f64>,
    pub free_water: Vec<f64>,
    pub streamflow: Vec<f64>,
}

impl FluxesTimeseries {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            actual_et: Vec::with_capacity(n),
            runoff: Vec::with_capacity(n),
            surface: Vec::with_capacity(n),
            interflow: Vec::with_capacity(n),
            groundwater: Vec::with_capacity(n),
            tension_water: Vec::with_capacity(n),
            free_water: Vec::with_capacity(n),
            streamflow: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, f: &Fluxes) {
        self.actual_et.push(f.actual_et);
        self.runoff.push(f.runoff);
        self.surface.push(f.surface);
        self.interflow.push(f.interflow);
        self.groundwater.push(f.groundwater);
        self.tension_water.push(f.tension_water);
        self.free_water.push(f.free_water);
        self.streamflow.push(f.streamflow);
    }

    pub fn len(&self) -> usize {
        self.streamflow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streamflow.is_empty()
    }
}

/// Execute one time step of XAJ.
///
/// Returns (new_state, fluxes).
pub fn step(state: &State, params: &XajParams, precip: f64, pet: f64) -> (State, Fluxes) {
    // 1. Evapotranspiration
    let et = processes::evapotranspiration(
        precip, pet, state.wu, state.wl, state.wd, params.lm, params.c,
    );
    let (eu, el, ed) = et;
    let e = eu + el + ed;
    let pe = precip - e;

    // 2. Runoff generation
    let (r, rim) = processes::runoff_generation(pe, state.w(), params.wm(), params.b, params.im);

    // 3. Tension water
    let (wu, wl, wd) = processes::update_tension_water(
        state.wu,
        state.wl,
        state.wd,
        precip,
        et,
        pe,
        r,
        (params.um, params.lm, params.dm),
    );

    // 4. Source separation
    let (ki, kg) = params.outflow_coefficients();
    let (rs, ri, rg, s, fr) =
        processes::source_separation(pe, r, state.s, state.fr, params.sm, params.ex, ki, kg);

    let pervious = 1.0 - params.im;
    let surface = rs * pervious + rim;
    let interflow_in = ri * pervious;
    let groundwater_in = rg * pervious;

    // 5. Routing
    let qi = processes::linear_reservoir(state.qi, interflow_in, params.ci);
    let qg = processes::linear_reservoir(state.qg, groundwater_in, params.cg);
    let q = processes::linear_reservoir(state.q, surface + qi + qg, params.cs);

    let new_state = State {
        wu,
        wl,
        wd,
        s,
        fr,
        qi,
        qg,
        q,
    };

    let fluxes = Fluxes {
        actual_et: e,
        runoff: r * pervious + rim,
        surface,
        interflow: qi,
        groundwater: qg,
        tension_water: new_state.w(),
        free_water: s * fr,
        streamflow: q,
    };

    (new_state, fluxes)
}

/// Run XAJ over a forcing series.
pub fn run(params: &XajParams, forcing: Forcing<'_>, initial_state: Option<&State>) -> FluxesTimeseries {
    let mut state = match initial_state {
        Some(s) => *s,
        None => State::initialize(params, &InitialState::default()),
    };

    let mut outputs = FluxesTimeseries::with_capacity(forcing.len());
    for (p, e) in forcing.precip.iter().zip(forcing.pet) {
        let (new_state, fluxes) = step(&state, params, *p, *e);
        outputs.push(&fluxes);
        state = new_state;
    }

    outputs
}

/// Lumped daily XAJ model.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xaj;

impl Simulator for Xaj {
    fn simulate(
        &self,
        params: &XajParams,
        forcing: Forcing<'_>,
        initial_state: &InitialState,
    ) -> Result<Vec<f64>, String> {
        params.check()?;
        initial_state.check()?;
        let state = State::initialize(params, initial_state);
        Ok(run(params, forcing, Some(&state)).streamflow)
    }
}
