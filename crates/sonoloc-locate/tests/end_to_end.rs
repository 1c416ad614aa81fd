//! End-to-end localization tests.
//!
//! Frames are built from Hann pulses at known offsets, so the expected delays
//! are exact and the solver output can be checked against ground truth.

use approx::assert_abs_diff_eq;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use sonoloc_core::{
    ChannelSignal, CoreError, DelayVector, EstimateValidity, Point3, ReceiverGeometry,
    SignalFrame, Technique,
};
use sonoloc_locate::{
    simulate::Scenario, Localizer, LocatorConfig, MultilaterationSolver, SolverConfig,
};
use sonoloc_signal::synth;

const FS: f64 = 1000.0;

fn pulse_channels(offsets: &[usize], n: usize) -> Vec<Vec<f64>> {
    let pulse = synth::hann_pulse(64);
    offsets
        .iter()
        .map(|&at| {
            let mut x = vec![0.0; n];
            assert!(synth::inject_pulse(&mut x, &pulse, at, 1.0));
            x
        })
        .collect()
}

fn frame_from(channels: Vec<Vec<f64>>, fs: f64) -> SignalFrame {
    SignalFrame::new(channels.into_iter().map(ChannelSignal::new).collect(), fs).unwrap()
}

fn wide_geometry() -> ReceiverGeometry {
    ReceiverGeometry::new(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(10.0, 0.0, 0.0),
        Point3::new(0.0, 10.0, 0.0),
        Point3::new(0.0, 0.0, 10.0),
        Point3::new(10.0, 10.0, 5.0),
    ])
    .unwrap()
}

#[test]
fn staggered_pulses_on_lab_geometry() {
    let localizer = Localizer::new(LocatorConfig::default()).unwrap();
    let frame = frame_from(pulse_channels(&[100, 105, 110, 115], 2000), FS);

    let estimate = localizer.locate(&frame, Technique::Correlation).unwrap();

    let samples = estimate.delays.in_samples(FS);
    for (got, want) in samples.iter().zip([5.0, 10.0, 15.0]) {
        assert!((got - want).abs() <= 1.0, "delays {samples:?}");
    }
    assert_eq!(estimate.validity, EstimateValidity::Valid);
    let p = estimate.position();
    assert!(p.is_finite());
    assert!(p.x.abs() < 100.0 && p.y.abs() < 100.0 && p.z.abs() < 100.0, "{p}");
}

#[test]
fn every_technique_localizes_staggered_pulses() {
    let localizer = Localizer::new(LocatorConfig::default()).unwrap();
    let silent_base = frame_from(pulse_channels(&[100, 105, 110, 115], 2000), FS);
    let raised_base = frame_from(
        pulse_channels(&[100, 105, 110, 115], 2000)
            .into_iter()
            .map(|x| x.into_iter().map(|v| v + 1.4).collect())
            .collect(),
        FS,
    );

    for technique in Technique::ALL {
        let frame = if technique == Technique::AmplitudeThreshold {
            &raised_base
        } else {
            &silent_base
        };
        let estimate = localizer.locate(frame, technique).unwrap();
        assert_eq!(estimate.technique, technique);
        assert!(estimate.validity.is_usable(), "{technique}: {}", estimate.validity);
        assert!(estimate.position().is_finite(), "{technique}");
    }
}

#[test]
fn simulated_event_round_trip() {
    let fs = 48_000.0;
    let config = LocatorConfig {
        geometry: wide_geometry(),
        sample_rate: fs,
        ..Default::default()
    };
    let localizer = Localizer::new(config.clone()).unwrap();

    for source in [
        Point3::new(3.0, 4.0, 2.0),
        Point3::new(6.0, 2.0, 3.0),
        Point3::new(2.0, 7.0, 1.0),
    ] {
        let scenario = Scenario {
            source,
            sample_rate: fs,
            samples: 2048,
            ..Default::default()
        };
        let event = scenario.render(&config.geometry).unwrap();
        assert!(event.truncated.is_empty());

        let estimate = localizer.locate(&event.frame, Technique::Correlation).unwrap();
        assert_eq!(estimate.validity, EstimateValidity::Valid);
        for (got, want) in estimate.delays.iter().zip(event.sampled_delays().iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 0.5 / fs);
        }
        let error = estimate.position().distance_to(&source);
        assert!(error < 0.25, "{source} -> {} ({error} m)", estimate.position());
    }
}

#[test]
fn four_receivers_with_range_closure_recover_source() {
    let geometry = ReceiverGeometry::lab_default();
    let solver = MultilaterationSolver::new(
        geometry.clone(),
        SolverConfig {
            range_closure: true,
            ..Default::default()
        },
    )
    .unwrap();
    let scenario = Scenario {
        source: Point3::new(1.0, 2.0, 0.5),
        ..Default::default()
    };
    let solution = solver.solve(&scenario.exact_delays(&geometry)).unwrap();
    assert!(solution.position.distance_to(&scenario.source) < 1e-3);
}

#[test]
fn silent_frame_is_no_event() {
    let localizer = Localizer::new(LocatorConfig::default()).unwrap();
    let frame = frame_from(vec![vec![0.0; 1000]; 4], FS);
    for technique in [Technique::Correlation, Technique::Wavelet, Technique::Rpa] {
        let estimate = localizer.locate(&frame, technique).unwrap();
        assert_eq!(estimate.validity, EstimateValidity::NoEvent, "{technique}");
        assert_eq!(estimate.position(), Point3::origin());
    }
}

#[test]
fn silent_reference_is_no_event_for_every_technique() {
    let localizer = Localizer::new(LocatorConfig::default()).unwrap();
    let mut channels = pulse_channels(&[0, 100, 105, 110], 1000);
    channels[0] = vec![0.0; 1000];
    // the amplitude detector idles at 1.4, so its reference sits flat there
    let raised = frame_from(
        channels
            .iter()
            .map(|x| x.iter().map(|v| v + 1.4).collect())
            .collect(),
        FS,
    );
    let flat = frame_from(channels, FS);

    for technique in Technique::ALL {
        let frame = if technique == Technique::AmplitudeThreshold {
            &raised
        } else {
            &flat
        };
        let estimate = localizer.locate(frame, technique).unwrap();
        assert_eq!(estimate.validity, EstimateValidity::NoEvent, "{technique}");
        assert!(!estimate.validity.is_usable(), "{technique}");
        assert_eq!(estimate.position(), Point3::origin());
        assert!(estimate.residual.is_none());
    }
}

#[test]
fn zero_delays_are_degraded_not_fatal() {
    let localizer = Localizer::new(LocatorConfig::default()).unwrap();
    let frame = frame_from(pulse_channels(&[300, 300, 300, 300], 1000), FS);
    let estimate = localizer.locate(&frame, Technique::Correlation).unwrap();
    assert!(estimate.delays.is_all_zero());
    assert!(matches!(
        estimate.validity,
        EstimateValidity::Degraded {
            clamped_delays: 3,
            ..
        }
    ));
    assert!(estimate.position().is_finite());
}

#[test]
fn unknown_technique_is_rejected() {
    let localizer = Localizer::new(LocatorConfig::default()).unwrap();
    let frame = frame_from(pulse_channels(&[100, 105, 110, 115], 1000), FS);
    for name in ["dpe", "Correlation ", "cwt", ""] {
        assert!(matches!(
            localizer.locate_named(&frame, name),
            Err(CoreError::Config(_))
        ));
    }
    assert!(localizer.locate_named(&frame, "amplitude-threshold").is_ok());
}

#[test]
fn undersized_geometry_is_rejected() {
    let err = ReceiverGeometry::new(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ])
    .unwrap_err();
    assert!(err.to_string().contains("at least 4"));
}

#[test]
fn interleaved_series_matches_separated_frame() {
    let localizer = Localizer::new(LocatorConfig::default()).unwrap();
    let channels = pulse_channels(&[100, 105, 110, 115], 1000);
    let n = channels.len();
    let lead = localizer.config().leading_channel();
    assert_eq!(lead, 3);

    // sample j belongs to channel (lead + j) % n
    let raw: Vec<f64> = (0..n * 1000)
        .map(|j| channels[(lead + j) % n][j / n])
        .collect();
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let interleaved = localizer
        .locate_interleaved(&raw, FS, ts, Technique::Correlation)
        .unwrap();
    let separated = localizer
        .locate(&frame_from(channels, FS), Technique::Correlation)
        .unwrap();

    assert_eq!(interleaved.delays, separated.delays);
    assert_eq!(interleaved.timestamp, ts);
    assert_eq!(interleaved.amplitude, *raw.last().unwrap());
    assert_abs_diff_eq!(interleaved.x, separated.x, epsilon = 1e-9);
}

#[test]
fn short_interleaved_series_is_signal_error() {
    let localizer = Localizer::new(LocatorConfig::default()).unwrap();
    let err = localizer
        .locate_interleaved(&[0.1, 0.2, 0.3], FS, Utc::now(), Technique::Correlation)
        .unwrap_err();
    assert!(matches!(err, CoreError::Signal(_)));
}

#[test]
fn batch_keeps_input_order() {
    let localizer = Localizer::new(LocatorConfig::default()).unwrap();
    let frames = vec![
        frame_from(pulse_channels(&[100, 105, 110, 115], 1000), FS),
        frame_from(vec![vec![0.0; 1000]; 4], FS),
        frame_from(pulse_channels(&[100, 105, 110], 1000), FS),
    ];
    let results = localizer.locate_batch(&frames, Technique::Correlation);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().validity, EstimateValidity::Valid);
    assert_eq!(results[1].as_ref().unwrap().validity, EstimateValidity::NoEvent);
    assert!(results[2].is_err());
}

fn delay_with_zeros() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), Just(-0.0), -0.02f64..0.02]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn solver_is_finite_with_zero_delays(
        delays in proptest::collection::vec(delay_with_zeros(), 3)
    ) {
        let solver = MultilaterationSolver::with_defaults(ReceiverGeometry::lab_default());
        let solution = solver.solve(&DelayVector::new(delays)).unwrap();
        prop_assert!(solution.position.is_finite());
        prop_assert!(solution.residual.is_finite());
    }
}
