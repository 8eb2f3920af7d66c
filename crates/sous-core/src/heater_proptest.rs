#[cfg(test)]
mod proptest_heater {
    use crate::duty_cycle::{DutyCycleSpec, Mode};
    use crate::heater::HeaterConfig;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        // Property: every fraction in range translates to a spec the engine accepts
        #[test]
        fn translation_is_always_valid(
            cycle_time in 0.5f64..=600.0,
            minimum_duration in 0.01f64..=30.0,
            fraction in 0.0f64..=1.0,
        ) {
            let config = HeaterConfig { cycle_time, minimum_duration, setting: 0.0 };
            let spec = config.spec_for(fraction);
            prop_assert!(spec.validate().is_ok(), "invalid spec {:?}", spec);
        }

        // Property: an oscillating spec never switches for less than the minimum
        // and always fills exactly one cycle
        #[test]
        fn oscillation_respects_minimum_duration(
            cycle_time in 0.5f64..=600.0,
            minimum_duration in 0.01f64..=30.0,
            fraction in 0.0f64..=1.0,
        ) {
            let config = HeaterConfig { cycle_time, minimum_duration, setting: 0.0 };
            let spec = config.spec_for(fraction);
            if let Mode::Oscillate { .. } = spec.mode() {
                prop_assert!(spec.hi_time >= minimum_duration);
                prop_assert!(spec.low_time >= minimum_duration);
                prop_assert!((spec.hi_time + spec.low_time - cycle_time).abs() < 1e-9);
            }
        }

        // Property: the on-latch wins whenever the off stretch is too short
        #[test]
        fn short_off_stretch_latches_on(
            cycle_time in 2.0f64..=600.0,
            fraction in 0.0f64..=1.0,
        ) {
            let config = HeaterConfig { cycle_time, minimum_duration: 1.0, setting: 0.0 };
            let time_off = cycle_time - cycle_time * fraction;
            if time_off < 1.0 {
                prop_assert_eq!(config.spec_for(fraction), DutyCycleSpec::ON);
            }
        }
    }
}
