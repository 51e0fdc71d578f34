//! P1 (charge conservation) and P2 (zero-trap identity), spec §8.

use arctic_core::{add_cti, AddCtiParams, CCDPhase, ClockConfig, DirectionParams, Verbosity, CCD, ROE};
use arctic_core::traps::TrapSpecies;
use ndarray::Array2;

fn params_with_density(density: f64, express: u32) -> AddCtiParams {
    let ccd = CCD::single_phase(CCDPhase::new(1000.0, 0.0, 1.0).unwrap());
    let roe = ROE::standard(vec![1.0]).unwrap();
    let traps = vec![TrapSpecies::instant_capture(density, 1.0).unwrap()];
    AddCtiParams {
        parallel: Some(DirectionParams {
            ccd,
            roe,
            traps,
            clock: ClockConfig {
                express,
                ..ClockConfig::default()
            },
        }),
        serial: None,
        verbosity: Verbosity::Silent,
    }
}

#[test]
fn p1_total_charge_is_conserved_for_several_images_and_express_levels() {
    for express in [0u32, 1, 3, 7] {
        let params = params_with_density(20.0, express);
        let mut image = Array2::<f64>::zeros((30, 4));
        image[(1, 0)] = 500.0;
        image[(10, 1)] = 2000.0;
        image[(29, 2)] = 50.0;
        image[(5, 3)] = 1.0;
        let before: f64 = image.sum();
        let after = add_cti(&image, &params).unwrap();
        let after_sum: f64 = after.sum();
        assert!(
            (before - after_sum).abs() < 1e-6,
            "express={express} before={before} after={after_sum}"
        );
    }
}

#[test]
fn p2_zero_density_traps_are_the_identity() {
    let params = params_with_density(0.0, 0);
    let mut image = Array2::<f64>::zeros((15, 2));
    image[(3, 0)] = 777.0;
    image[(12, 1)] = 42.0;
    let after = add_cti(&image, &params).unwrap();
    for ((r, c), v) in image.indexed_iter() {
        assert!((after[(r, c)] - v).abs() < 1e-9, "({r},{c})");
    }
}

#[test]
fn p2_no_bright_pixels_means_no_trail() {
    let params = params_with_density(50.0, 0);
    let image = Array2::<f64>::zeros((15, 2));
    let after = add_cti(&image, &params).unwrap();
    assert!(after.iter().all(|&v| v.abs() < 1e-12));
}
