// lf-core/src/units.rs

use uom::si::f64::{
    AvailableEnergy as UomAvailableEnergy, MassDensity as UomMassDensity,
    Pressure as UomPressure,
};

// Public canonical unit types (SI, f64)
pub type Density = UomMassDensity;
pub type Pressure = UomPressure;
/// Pressure divided by density [m²/s²], the pressure variable of incompressible solvers.
pub type KinematicPressure = UomAvailableEnergy;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn kgpm3(v: f64) -> Density {
    use uom::si::mass_density::kilogram_per_cubic_meter;
    Density::new::<kilogram_per_cubic_meter>(v)
}

/// Numeric value of a pressure in Pa.
#[inline]
pub fn pa_value(p: Pressure) -> f64 {
    use uom::si::pressure::pascal;
    p.get::<pascal>()
}

/// Convert a dynamic pressure into kinematic pressure, p/ρ.
#[inline]
pub fn kinematic(p: Pressure, rho: Density) -> KinematicPressure {
    p / rho
}

/// Numeric value of a kinematic pressure in m²/s².
#[inline]
pub fn kinematic_value(p: KinematicPressure) -> f64 {
    use uom::si::available_energy::joule_per_kilogram;
    p.get::<joule_per_kilogram>()
}

/// Dynamic pressure from a kinematic value [m²/s²].
#[inline]
pub fn dynamic_from_kinematic(value: f64, rho: Density) -> Pressure {
    use uom::si::available_energy::joule_per_kilogram;
    KinematicPressure::new::<joule_per_kilogram>(value) * rho
}

/// Pressure in mmHg, the unit outlet pressures are usually reported in.
#[inline]
pub fn mmhg_value(p: Pressure) -> f64 {
    use uom::si::pressure::millimeter_of_mercury;
    p.get::<millimeter_of_mercury>()
}

pub mod constants {
    /// Default blood density used by impedance boundaries.
    pub const BLOOD_RHO_KGPM3: f64 = 1060.0;

    /// Fallback density when nothing else supplies one.
    pub const WATER_RHO_KGPM3: f64 = 1000.0;
}
