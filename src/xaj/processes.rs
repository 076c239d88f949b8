/// XAJ process functions.
///
/// Pure functions for each physical process of one time step. Depths are in mm.
use super::constants::MIN_RUNOFF_AREA;

/// Three-layer evapotranspiration.
///
/// The upper layer evaporates at potential rate while it holds water; the
/// lower layer at a rate proportional to its storage (floored by C times
/// the remaining demand); the deep layer only covers what the lower layer
/// cannot.
///
/// Returns (eu, el, ed).
pub fn evapotranspiration(
    precip: f64,
    pet: f64,
    wu: f64,
    wl: f64,
    wd: f64,
    lm: f64,
    c: f64,
) -> (f64, f64, f64) {
    if wu + precip >= pet {
        return (pet, 0.0, 0.0);
    }

    let eu = wu + precip;
    let remaining = pet - eu;

    let (el, ed) = if lm > 0.0 && wl >= c * lm {
        (remaining * wl / lm, 0.0)
    } else if wl >= c * remaining {
        (c * remaining, 0.0)
    } else {
        (wl, c * remaining - wl)
    };

    (eu, el.min(wl), ed.min(wd).max(0.0))
}

/// Saturation-excess runoff over the parabolic tension water capacity curve.
///
/// `pe` is net rainfall (precipitation minus evapotranspiration) and `w` the
/// current tension water. Runoff from the pervious area is bounded by `pe`;
/// the impervious fraction `im` turns net rainfall into direct runoff.
///
/// Returns (pervious runoff, impervious runoff).
pub fn runoff_generation(pe: f64, w: f64, wm: f64, b: f64, im: f64) -> (f64, f64) {
    if pe <= 0.0 {
        return (0.0, 0.0);
    }

    let w = w.clamp(0.0, wm);
    let wmm = wm * (1.0 + b);
    let a = wmm * (1.0 - (1.0 - w / wm).powf(1.0 / (1.0 + b)));

    let r = if pe + a < wmm {
        pe - (wm - w) + wm * (1.0 - (pe + a) / wmm).powf(1.0 + b)
    } else {
        pe - (wm - w)
    };

    (r.clamp(0.0, pe), pe * im)
}

/// Update the three tension water layers.
///
/// With positive net rainfall, infiltration (`pe - r`) fills the upper
/// layer first and overflows downwards. Otherwise each layer loses its own
/// evapotranspiration.
///
/// Returns (wu, wl, wd).
#[allow(clippy::too_many_arguments)]
pub fn update_tension_water(
    wu: f64,
    wl: f64,
    wd: f64,
    precip: f64,
    et: (f64, f64, f64),
    pe: f64,
    r: f64,
    capacities: (f64, f64, f64),
) -> (f64, f64, f64) {
    let (eu, el, ed) = et;
    let (um, lm, dm) = capacities;

    if pe > 0.0 {
        let mut new_wu = wu + pe - r;
        let mut new_wl = wl;
        let mut new_wd = wd;
        if new_wu > um {
            new_wl += new_wu - um;
            new_wu = um;
        }
        if new_wl > lm {
            new_wd += new_wl - lm;
            new_wl = lm;
        }
        (new_wu, new_wl, new_wd.min(dm))
    } else {
        (
            (wu + precip - eu).max(0.0),
            (wl - el).max(0.0),
            (wd - ed).max(0.0),
        )
    }
}

/// Split runoff into surface, interflow and groundwater components through
/// the free water reservoir.
///
/// `s` is free water over the previous runoff-producing area `fr`; when new
/// runoff is generated the area becomes `r / pe` and storage is rescaled so
/// that the free water volume is conserved.
///
/// Returns (rs, ri, rg, new_s, new_fr), runoff components being depths over
/// the pervious area.
#[allow(clippy::too_many_arguments)]
pub fn source_separation(
    pe: f64,
    r: f64,
    s: f64,
    fr: f64,
    sm: f64,
    ex: f64,
    ki: f64,
    kg: f64,
) -> (f64, f64, f64, f64, f64) {
    if sm <= 0.0 {
        return (r, 0.0, 0.0, 0.0, fr);
    }

    let (mut s, new_fr) = if r > 0.0 && pe > 0.0 {
        let new_fr = (r / pe).clamp(MIN_RUNOFF_AREA, 1.0);
        (s * fr / new_fr, new_fr)
    } else {
        (s, fr.max(MIN_RUNOFF_AREA))
    };
    s = s.clamp(0.0, sm);

    let mut rs = 0.0;
    if r > 0.0 {
        let smm = sm * (1.0 + ex);
        let au = smm * (1.0 - (1.0 - s / sm).powf(1.0 / (1.0 + ex)));
        rs = if pe + au < smm {
            new_fr * (pe + s - sm + sm * (1.0 - (pe + au) / smm).powf(1.0 + ex))
        } else {
            new_fr * (pe + s - sm)
        };
        rs = rs.clamp(0.0, r);
        s += (r - rs) / new_fr;
        if s > sm {
            rs += (s - sm) * new_fr;
            s = sm;
        }
    }

    let ri = ki * s * new_fr;
    let rg = kg * s * new_fr;
    s *= 1.0 - ki - kg;

    (rs, ri, rg, s, new_fr)
}

/// Linear reservoir: `k * previous + (1 - k) * inflow`.
#[inline]
pub fn linear_reservoir(previous: f64, inflow: f64, k: f64) -> f64 {
    k * previous + (1.0 - k) * inflow
}
