//! Randomized interleaving of capture, analysis and resets
//!
//! Whatever order the callback, the worker and the control thread run in,
//! every slot of the active bucket is in exactly one place.

use loopback_analyzer::audio::{AudioProcessor, DuplexStage, WorkOutcome};
use loopback_analyzer::state::POOL_SIZE;
use loopback_analyzer::{AudioConfig, WindowFilter};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    /// One capture period of this many frames
    Capture(usize),
    /// One worker cycle
    Work,
    /// Switch the analysis length (short or long)
    Reset(bool),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (1usize..700).prop_map(Step::Capture),
        3 => Just(Step::Work),
        1 => any::<bool>().prop_map(Step::Reset),
    ]
}

fn capture(stage: &mut DuplexStage, frames: usize) {
    let input: Vec<f32> = (0..frames)
        .flat_map(|n| {
            let r = (n as f32 * 0.07).sin();
            [r, 0.5 * r]
        })
        .collect();
    let mut output = vec![0.0f32; frames * 2];
    stage.process(&input, &mut output);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_slot_accounted_for(steps in prop::collection::vec(step(), 1..80)) {
        let config = AudioConfig {
            analysis_samples: 1024,
            window_filter: WindowFilter::None,
            buffer_frames: 256,
            ..Default::default()
        };
        let mut processor = AudioProcessor::with_lengths(config, &[1024, 2048]).unwrap();
        let mut stage = processor.duplex_stage(2);
        let mut worker = processor.worker();
        let mut frames = processor.frame_count();

        for step in steps {
            match step {
                Step::Capture(count) => capture(&mut stage, count),
                Step::Work => {
                    let outcome = worker.process_one().unwrap();
                    prop_assert_ne!(outcome, WorkOutcome::Discarded);
                }
                Step::Reset(long) => {
                    let length = if long { 2048 } else { 1024 };
                    let config = AudioConfig {
                        analysis_samples: length,
                        ..processor.config().clone()
                    };
                    processor.set_config(config).unwrap();
                }
            }

            let occupancy = processor.occupancy();
            prop_assert_eq!(occupancy.total(), POOL_SIZE);
            prop_assert_eq!(occupancy.processing, 0);
            prop_assert!(occupancy.capturing <= 1);
            prop_assert!(occupancy.done <= 1);

            let now = processor.frame_count();
            prop_assert!(now >= frames);
            frames = now;

            if let Some(data) = processor.state_data() {
                prop_assert_eq!(data.length, processor.config().analysis_samples);
            }
        }
    }
}
