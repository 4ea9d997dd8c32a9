//! Constants shared by the prediction models.

/// Twin prime constant C2 = ∏_{p>2} (1 - 1/(p-1)^2).
pub const TWIN_PRIME_C2: f64 = 0.660_161_815_846_869_573_927_812_110_014_555_778_4;

/// Euler–Mascheroni constant.
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_860_606_512_09;

/// 4·e^(-2γ)·C2.
pub const KAPPA: f64 = 0.832_429_065_661_945_306;

/// 4·C2·e^(-γ), the Mertens-weighted singular series constant.
pub const KPROD: f64 = 1.482_616_448_783_842_164_923_887_568_565_481_688_8;

/// KPROD squared; the asymptotic limit of Cminus.
pub const KPRODKPROD: f64 = 2.198_151_534_204_411_277_318_577_294_028_388_792_6;
