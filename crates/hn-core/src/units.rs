// hn-core/src/units.rs

use uom::si::f64::{
    Area as UomArea, Length as UomLength, Time as UomTime, Velocity as UomVelocity,
    VolumeRate as UomVolumeRate,
};

// Public canonical unit types (SI, f64)
pub type Area = UomArea;
pub type Length = UomLength;
pub type Time = UomTime;
pub type Velocity = UomVelocity;
pub type VolumeRate = UomVolumeRate;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn hours(v: f64) -> Time {
    use uom::si::time::hour;
    Time::new::<hour>(v)
}

#[inline]
pub fn m3ps(v: f64) -> VolumeRate {
    use uom::si::volume_rate::cubic_meter_per_second;
    VolumeRate::new::<cubic_meter_per_second>(v)
}

#[inline]
pub fn lps(v: f64) -> VolumeRate {
    use uom::si::volume_rate::liter_per_second;
    VolumeRate::new::<liter_per_second>(v)
}

/// Cross-section area of a circular pipe.
#[inline]
pub fn circle_area(diameter: Length) -> Area {
    diameter * diameter * (std::f64::consts::PI / 4.0)
}

pub mod constants {
    /// Standard gravity, m/s^2.
    pub const G0_MPS2: f64 = 9.806_65;

    /// Hazen-Williams flow exponent.
    pub const HW_EXPONENT: f64 = 1.852;

    /// Hazen-Williams SI resistance prefactor (head in m, flow in m^3/s).
    pub const HW_K_SI: f64 = 10.667;
}
