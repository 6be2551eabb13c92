use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::{
    gradient::Gradient,
    store::{TargetPositions, TargetStore},
    surface::Surface,
};
use crate::{
    color::{rgba_pixel_to_hsv, NormalizedHsv},
    settings::SamplerSettings,
};

/// Diameter of a target's drag handle, in surface pixels.
pub const HANDLE_DIAMETER: f32 = 20.0;

pub const DEFAULT_POSITION: Position = Position { x: 50.0, y: 50.0 };

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn clamped(self, width: usize, height: usize) -> Self {
        Self {
            x: self.x.clamp(0.0, width as f32),
            y: self.y.clamp(0.0, height as f32),
        }
    }

    fn distance(&self, x: f32, y: f32) -> f32 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}

/// Colour a listening group should take on.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorUpdate {
    pub group_id: String,
    pub color: NormalizedHsv,
}

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    position: Position,
    color: NormalizedHsv,
    at: Instant,
}

#[derive(Clone, Debug, PartialEq)]
enum Drag {
    Idle,
    Dragging { group_id: String },
}

/// Surface, sample targets and the emission bookkeeping for one sampler.
///
/// Two paths emit colours. While a target is dragged, moves emit at most once
/// per debounce window. Independently, the idle pass re-reads every target
/// and emits when the colour under it drifted past the tolerance, which is
/// what keeps groups following an animated surface.
pub struct SamplerEngine {
    surface: Surface,
    gradient: Option<Gradient>,
    fill: [u8; 3],
    targets: BTreeMap<String, Position>,
    saved: TargetPositions,
    cache: BTreeMap<String, CacheEntry>,
    last_drag_emit: BTreeMap<String, Instant>,
    drag: Drag,
    debounce: Duration,
    tolerance: f32,
    store: Box<dyn TargetStore>,
}

impl SamplerEngine {
    pub fn new(settings: &SamplerSettings, store: Box<dyn TargetStore>) -> Self {
        let saved = store.load().unwrap_or_else(|e| {
            log::warn!("Ignoring stored sample targets: {e}");
            TargetPositions::new()
        });

        let mut engine = Self {
            surface: Surface::new(settings.width, settings.height),
            gradient: settings.gradient.clone().map(Gradient::new),
            fill: settings.fill,
            targets: BTreeMap::new(),
            saved,
            cache: BTreeMap::new(),
            last_drag_emit: BTreeMap::new(),
            drag: Drag::Idle,
            debounce: Duration::from_millis(settings.debounce_ms),
            tolerance: settings.tolerance,
            store,
        };

        engine.render();
        engine.set_listening(&settings.listen_groups);
        engine
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn targets(&self) -> &BTreeMap<String, Position> {
        &self.targets
    }

    pub fn dragging(&self) -> Option<&str> {
        match &self.drag {
            Drag::Idle => None,
            Drag::Dragging { group_id } => Some(group_id),
        }
    }

    pub fn is_animated(&self) -> bool {
        self.gradient.is_some()
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        self.gradient
            .as_ref()
            .map(|g| Duration::from_secs_f64(1.0 / f64::from(g.frame_rate())))
    }

    /// Makes the set of targets match `group_ids`. New targets start at their
    /// stored position, or the default one. Targets of groups that stopped
    /// listening are dropped but their stored position is kept.
    pub fn set_listening(&mut self, group_ids: &[String]) {
        let (width, height) = (self.surface.width(), self.surface.height());

        let targets: BTreeMap<String, Position> = group_ids
            .iter()
            .map(|id| {
                let position = self
                    .targets
                    .get(id)
                    .or_else(|| self.saved.get(id))
                    .copied()
                    .unwrap_or(DEFAULT_POSITION)
                    .clamped(width, height);
                (id.clone(), position)
            })
            .collect();

        self.cache.retain(|id, _| targets.contains_key(id));
        self.last_drag_emit.retain(|id, _| targets.contains_key(id));

        if let Drag::Dragging { group_id } = &self.drag {
            if !targets.contains_key(group_id) {
                self.drag = Drag::Idle;
            }
        }

        self.targets = targets;
        self.persist();
    }

    /// Moves a target back to the default position. For groups not currently
    /// listening, forgets the stored position instead.
    pub fn reset_target(&mut self, group_id: &str) {
        let default = DEFAULT_POSITION.clamped(self.surface.width(), self.surface.height());

        match self.targets.get_mut(group_id) {
            Some(position) => *position = default,
            None => {
                self.saved.remove(group_id);
            }
        }

        self.persist();
    }

    /// Starts dragging the handle under the pointer, picking the closest one
    /// when handles overlap.
    pub fn pointer_down(&mut self, x: f32, y: f32) -> Option<&str> {
        let hit = self
            .targets
            .iter()
            .map(|(id, position)| (id, position.distance(x, y)))
            .filter(|(_, distance)| *distance <= HANDLE_DIAMETER / 2.0)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id.clone())?;

        self.drag = Drag::Dragging { group_id: hit };
        self.dragging()
    }

    pub fn pointer_move(&mut self, x: f32, y: f32, now: Instant) -> Option<ColorUpdate> {
        let group_id = match &self.drag {
            Drag::Idle => return None,
            Drag::Dragging { group_id } => group_id.clone(),
        };

        let position = Position::new(x, y).clamped(self.surface.width(), self.surface.height());
        self.targets.insert(group_id.clone(), position);
        self.persist();

        let due = self
            .last_drag_emit
            .get(&group_id)
            .map_or(true, |last| now.duration_since(*last) >= self.debounce);

        if !due {
            return None;
        }

        // The window restarts even when nothing could be read
        self.last_drag_emit.insert(group_id.clone(), now);

        let color = self.read(position)?;
        self.cache.insert(
            group_id.clone(),
            CacheEntry {
                position,
                color,
                at: now,
            },
        );

        Some(ColorUpdate { group_id, color })
    }

    /// Ends a drag, from either pointer up or the pointer leaving the surface.
    pub fn pointer_up(&mut self) {
        self.drag = Drag::Idle;
    }

    /// Re-reads every target. Emits for targets never emitted before, targets
    /// that moved since their last emission, and colours that drifted past
    /// the tolerance. `force` emits every readable target.
    pub fn sample_idle(&mut self, now: Instant, force: bool) -> Vec<ColorUpdate> {
        let mut updates = vec![];

        for (group_id, position) in &self.targets {
            let Some(color) = rgba_pixel_to_hsv(self.surface.pixel(position.x, position.y)) else {
                continue;
            };

            let changed = match self.cache.get(group_id) {
                None => true,
                Some(cached) => {
                    cached.position != *position
                        || !cached.color.within_tolerance(&color, self.tolerance)
                }
            };

            if !(force || changed) {
                continue;
            }

            if let Some(cached) = self.cache.get(group_id) {
                log::debug!(
                    "Colour update for {group_id}: {:?} -> {color:?} after {:?}{}",
                    cached.color,
                    now.saturating_duration_since(cached.at),
                    if force { " (forced)" } else { "" }
                );
            }

            self.cache.insert(
                group_id.clone(),
                CacheEntry {
                    position: *position,
                    color,
                    at: now,
                },
            );
            updates.push(ColorUpdate {
                group_id: group_id.clone(),
                color,
            });
        }

        updates
    }

    /// Paints the current frame without advancing the animation.
    pub fn render(&mut self) {
        match &self.gradient {
            Some(gradient) => gradient.render(&mut self.surface),
            None => self.surface.fill(self.fill),
        }
    }

    pub fn next_frame(&mut self) {
        if let Some(gradient) = &mut self.gradient {
            gradient.advance();
            gradient.render(&mut self.surface);
        }
    }

    /// Reallocates the surface and pulls targets back inside it. The surface
    /// stays blank until the next render.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.surface.resize(width, height);

        let mut moved = false;
        for position in self.targets.values_mut() {
            let clamped = position.clamped(width, height);
            if clamped != *position {
                *position = clamped;
                moved = true;
            }
        }

        if moved {
            self.persist();
        }
    }

    fn read(&self, position: Position) -> Option<NormalizedHsv> {
        rgba_pixel_to_hsv(self.surface.pixel(position.x, position.y))
    }

    fn persist(&mut self) {
        for (id, position) in &self.targets {
            self.saved.insert(id.clone(), *position);
        }

        if let Err(e) = self.store.save(&self.saved) {
            log::warn!("Could not save sample targets: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::store::MemoryStore;

    fn settings(listen: &[&str]) -> SamplerSettings {
        SamplerSettings {
            width: 100,
            height: 80,
            listen_groups: listen.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn engine(listen: &[&str]) -> (SamplerEngine, MemoryStore) {
        let store = MemoryStore::default();
        let engine = SamplerEngine::new(&settings(listen), Box::new(store.clone()));
        (engine, store)
    }

    fn paint(engine: &mut SamplerEngine, rgb: [u8; 3]) {
        engine.surface.fill(rgb);
    }

    #[test]
    fn targets_start_at_default_or_stored_position() {
        let store = MemoryStore::default();
        let mut saved = TargetPositions::new();
        saved.insert("g2".to_string(), Position::new(70.0, 10.0));
        store.clone().save(&saved).unwrap();

        let engine = SamplerEngine::new(&settings(&["g1", "g2"]), Box::new(store.clone()));

        assert_eq!(engine.targets()["g1"], DEFAULT_POSITION);
        assert_eq!(engine.targets()["g2"], Position::new(70.0, 10.0));
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn opting_out_keeps_stored_position() {
        let (mut engine, store) = engine(&["g1"]);
        engine.pointer_down(50.0, 50.0);
        engine.pointer_move(20.0, 30.0, Instant::now());
        engine.pointer_up();

        engine.set_listening(&[]);
        assert!(engine.targets().is_empty());
        assert_eq!(store.snapshot()["g1"], Position::new(20.0, 30.0));

        engine.set_listening(&["g1".to_string()]);
        assert_eq!(engine.targets()["g1"], Position::new(20.0, 30.0));
    }

    #[test]
    fn reset_returns_target_to_default() {
        let (mut engine, store) = engine(&["g1"]);
        engine.pointer_down(50.0, 50.0);
        engine.pointer_move(5.0, 5.0, Instant::now());
        engine.pointer_up();

        engine.reset_target("g1");
        assert_eq!(engine.targets()["g1"], DEFAULT_POSITION);
        assert_eq!(store.snapshot()["g1"], DEFAULT_POSITION);
    }

    #[test]
    fn pointer_down_hits_only_within_handle() {
        let (mut engine, _) = engine(&["g1"]);

        assert_eq!(engine.pointer_down(50.0, 61.0), None);
        assert_eq!(engine.dragging(), None);

        assert_eq!(engine.pointer_down(57.0, 55.0), Some("g1"));
        engine.pointer_up();
        assert_eq!(engine.dragging(), None);
    }

    #[test]
    fn moves_without_drag_are_ignored() {
        let (mut engine, _) = engine(&["g1"]);
        assert_eq!(engine.pointer_move(10.0, 10.0, Instant::now()), None);
        assert_eq!(engine.targets()["g1"], DEFAULT_POSITION);
    }

    #[test]
    fn drag_positions_are_clamped() {
        let (mut engine, _) = engine(&["g1"]);
        engine.pointer_down(50.0, 50.0);

        let update = engine.pointer_move(-30.0, 500.0, Instant::now()).unwrap();
        assert_eq!(engine.targets()["g1"], Position::new(0.0, 80.0));
        assert_eq!(update.group_id, "g1");
        // Static surface is red
        assert_eq!(update.color, NormalizedHsv::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn drag_emits_at_most_once_per_debounce_window() {
        let (mut engine, _) = engine(&["g1"]);
        engine.pointer_down(50.0, 50.0);

        let start = Instant::now();
        let emitted: Vec<u64> = (0..=50u64)
            .map(|i| i * 10)
            .filter(|&ms| {
                engine
                    .pointer_move(10.0 + ms as f32 / 10.0, 40.0, start + Duration::from_millis(ms))
                    .is_some()
            })
            .collect();

        assert_eq!(emitted, vec![0, 100, 200, 300, 400, 500]);
        for pair in emitted.windows(2) {
            assert!(pair[1] - pair[0] >= 100);
        }
    }

    #[test]
    fn debounce_window_restarts_without_a_read() {
        let (mut engine, _) = engine(&["g1"]);
        engine.pointer_down(50.0, 50.0);
        let start = Instant::now();

        engine.resize(0, 0);
        assert_eq!(engine.pointer_move(10.0, 10.0, start), None);

        engine.resize(100, 80);
        engine.render();
        assert_eq!(
            engine.pointer_move(10.0, 10.0, start + Duration::from_millis(50)),
            None
        );
        assert!(engine
            .pointer_move(10.0, 10.0, start + Duration::from_millis(100))
            .is_some());
    }

    #[test]
    fn idle_emits_first_time_then_only_on_change() {
        let (mut engine, _) = engine(&["g1"]);
        let now = Instant::now();

        assert_eq!(engine.sample_idle(now, false).len(), 1);
        assert!(engine.sample_idle(now, false).is_empty());

        paint(&mut engine, [0, 255, 0]);
        let updates = engine.sample_idle(now, false);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].color, NormalizedHsv::new(120.0, 1.0, 1.0));
    }

    #[test]
    fn idle_tolerance_suppresses_small_drift() {
        let (mut engine, _) = engine(&["g1"]);
        let now = Instant::now();

        let cache = |engine: &mut SamplerEngine, color| {
            engine.cache.insert(
                "g1".to_string(),
                CacheEntry {
                    position: DEFAULT_POSITION,
                    color,
                    at: now,
                },
            );
        };

        // The static surface reads as (0, 1, 1) under the target
        cache(&mut engine, NormalizedHsv::new(0.9, 0.1, 0.1));
        assert!(engine.sample_idle(now, false).is_empty());

        cache(&mut engine, NormalizedHsv::new(1.1, 1.0, 1.0));
        assert_eq!(engine.sample_idle(now, false).len(), 1);
    }

    #[test]
    fn idle_emits_full_range_saturation_and_value_changes() {
        let (mut engine, _) = engine(&["g1"]);
        let now = Instant::now();

        paint(&mut engine, [255, 255, 255]);
        let white = engine.sample_idle(now, false);
        assert_eq!(white[0].color, NormalizedHsv::new(0.0, 0.0, 1.0));

        paint(&mut engine, [0, 0, 0]);
        let black = engine.sample_idle(now, false);
        assert_eq!(black.len(), 1);
        assert_eq!(black[0].color, NormalizedHsv::new(0.0, 0.0, 0.0));

        paint(&mut engine, [255, 0, 0]);
        let red = engine.sample_idle(now, false);
        assert_eq!(red.len(), 1);
        assert_eq!(red[0].color, NormalizedHsv::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn idle_emits_after_target_moved() {
        let (mut engine, _) = engine(&["g1"]);
        let now = Instant::now();
        engine.sample_idle(now, false);

        engine.pointer_down(50.0, 50.0);
        engine.pointer_move(60.0, 60.0, now);
        engine.pointer_up();
        // The drag emission already cached the new position
        assert!(engine.sample_idle(now, false).is_empty());

        engine.targets.insert("g1".to_string(), Position::new(61.0, 60.0));
        assert_eq!(engine.sample_idle(now, false).len(), 1);
    }

    #[test]
    fn forced_pass_emits_every_target() {
        let (mut engine, _) = engine(&["g1", "g2"]);
        let now = Instant::now();
        engine.sample_idle(now, false);

        assert!(engine.sample_idle(now, false).is_empty());
        let forced = engine.sample_idle(now, true);
        let ids: Vec<&str> = forced.iter().map(|u| u.group_id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g2"]);
    }

    #[test]
    fn resize_clamps_targets_and_blanks_surface() {
        let (mut engine, store) = engine(&["g1"]);
        engine.resize(30, 20);

        assert_eq!(engine.targets()["g1"], Position::new(30.0, 20.0));
        assert_eq!(store.snapshot()["g1"], Position::new(30.0, 20.0));

        let updates = engine.sample_idle(Instant::now(), false);
        assert_eq!(updates[0].color, NormalizedHsv::new(0.0, 0.0, 0.0));

        engine.render();
        let updates = engine.sample_idle(Instant::now(), false);
        assert_eq!(updates[0].color, NormalizedHsv::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn gradient_frames_change_what_targets_see() {
        let store = MemoryStore::default();
        let settings = SamplerSettings {
            gradient: Some(crate::settings::GradientSettings {
                stops: 6,
                speed: 0.1,
                smoothness: 0.0,
                fps: 30,
            }),
            ..settings(&["g1"])
        };
        let mut engine = SamplerEngine::new(&settings, Box::new(store));
        assert!(engine.is_animated());
        assert!(engine.frame_interval().is_some());

        let now = Instant::now();
        let first = engine.sample_idle(now, false);
        assert_eq!(first.len(), 1);

        for _ in 0..3 {
            engine.next_frame();
        }
        let second = engine.sample_idle(now, false);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].color, second[0].color);
    }
}
