use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, interval_at, Instant, Interval, MissedTickBehavior},
};

use super::engine::{ColorUpdate, SamplerEngine};
use crate::settings::SamplerSettings;

const INPUT_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum SamplerInput {
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp,
    PointerLeave,
    Resize { width: usize, height: usize },
    Listen(Vec<String>),
    ResetTarget(String),
    /// Emit every target on the next pass regardless of change
    ForceSample,
}

/// Handle to a running sampler task.
pub struct SamplerHandle {
    input: mpsc::Sender<SamplerInput>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    pub async fn send(&self, input: SamplerInput) {
        if self.input.send(input).await.is_err() {
            log::warn!("Sampler is not running, dropping input");
        }
    }

    /// Aborts the task. Writes already handed to the consumer are unaffected.
    pub fn stop(self) {
        self.task.abort();
    }
}

async fn next_frame(frames: &mut Option<Interval>) {
    match frames {
        Some(frames) => {
            frames.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn emit(updates: &mpsc::UnboundedSender<ColorUpdate>, update: ColorUpdate) {
    if updates.send(update).is_err() {
        log::debug!("No consumer for colour updates");
    }
}

fn handle_input(
    engine: &mut SamplerEngine,
    input: SamplerInput,
    updates: &mpsc::UnboundedSender<ColorUpdate>,
) {
    match input {
        SamplerInput::PointerDown { x, y } => {
            if let Some(group_id) = engine.pointer_down(x, y) {
                log::debug!("Dragging sample target of {group_id}");
            }
        }
        SamplerInput::PointerMove { x, y } => {
            if let Some(update) = engine.pointer_move(x, y, Instant::now()) {
                emit(updates, update);
            }
        }
        SamplerInput::PointerUp | SamplerInput::PointerLeave => engine.pointer_up(),
        SamplerInput::Resize { width, height } => {
            engine.resize(width, height);
            // Nothing else repaints a static surface
            if !engine.is_animated() {
                engine.render();
            }
        }
        SamplerInput::Listen(group_ids) => engine.set_listening(&group_ids),
        SamplerInput::ResetTarget(group_id) => engine.reset_target(&group_id),
        SamplerInput::ForceSample => {
            for update in engine.sample_idle(Instant::now(), true) {
                emit(updates, update);
            }
        }
    }
}

/// Runs the sampler on its own task. The engine is owned by the task, so no
/// locking is involved; everything reaches it through the input channel.
pub fn start_sampler_loop(
    settings: &SamplerSettings,
    mut engine: SamplerEngine,
    updates: mpsc::UnboundedSender<ColorUpdate>,
) -> SamplerHandle {
    let (input, mut inputs) = mpsc::channel(INPUT_CAPACITY);
    let sample_period = Duration::from_millis(settings.sample_interval_ms.max(1));

    let task = tokio::spawn(async move {
        let mut samples = interval_at(Instant::now() + sample_period, sample_period);
        samples.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut frames = engine.frame_interval().map(|period| {
            let mut frames = interval(period);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            frames
        });

        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => handle_input(&mut engine, input, &updates),
                    None => break,
                },
                now = samples.tick() => {
                    for update in engine.sample_idle(now, false) {
                        emit(&updates, update);
                    }
                }
                _ = next_frame(&mut frames) => engine.next_frame(),
            }
        }

        log::debug!("Sampler input closed, stopping");
    });

    SamplerHandle { input, task }
}
