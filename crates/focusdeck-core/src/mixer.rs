use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Sound;
use crate::store::{self, Store};

const TRACKS_KEY: &str = "mixer-tracks";
const MASTER_VOLUME_KEY: &str = "mixer-volume";

const DEFAULT_TRACK_VOLUME: f64 = 0.5;
const DEFAULT_MASTER_VOLUME: f64 = 0.8;

/// A track that is currently enabled. Absence from the map means disabled;
/// toggling a track off destroys its record, volume included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTrack {
    pub id: String,
    pub volume: f64,
    pub is_playing: bool,
}

/// Media playback port. `play` is a request, not a guarantee: a refused
/// start (autoplay policy, missing asset) must not affect other tracks.
pub trait Playback {
    fn play(&mut self, track_id: &str, path: &str) -> anyhow::Result<()>;
    fn pause(&mut self, track_id: &str);
    fn set_volume(&mut self, track_id: &str, volume: f64);
    fn stop(&mut self, track_id: &str);
}

/// Playback sink for frontends without an audio device.
#[derive(Debug, Default)]
pub struct NoopPlayback;

impl Playback for NoopPlayback {
    fn play(&mut self, _track_id: &str, _path: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn pause(&mut self, _track_id: &str) {}

    fn set_volume(&mut self, _track_id: &str, _volume: f64) {}

    fn stop(&mut self, _track_id: &str) {}
}

/// Owns the enabled-track set, per-track volumes, and the master volume,
/// and keeps the playback port in sync with that logical state.
#[derive(Debug)]
pub struct AudioMixer {
    tracks: BTreeMap<String, ActiveTrack>,
    master_volume: f64,
}

impl AudioMixer {
    /// Loads persisted tracks and master volume; both tolerate absence and
    /// malformed payloads. Loading happens before any save can.
    #[tracing::instrument(skip(store))]
    pub fn load(store: &dyn Store) -> Self {
        let tracks = store::load_json::<BTreeMap<String, ActiveTrack>>(store, TRACKS_KEY)
            .unwrap_or_default();
        let master_volume = store::load_json::<f64>(store, MASTER_VOLUME_KEY)
            .map(clamp_volume)
            .unwrap_or(DEFAULT_MASTER_VOLUME);

        debug!(tracks = tracks.len(), master_volume, "loaded mixer state");
        Self {
            tracks,
            master_volume,
        }
    }

    pub fn tracks(&self) -> &BTreeMap<String, ActiveTrack> {
        &self.tracks
    }

    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    pub fn is_enabled(&self, sound_id: &str) -> bool {
        self.tracks.contains_key(sound_id)
    }

    pub fn any_playing(&self) -> bool {
        self.tracks.values().any(|track| track.is_playing)
    }

    /// `track.volume * master`, clamped to [0,1]; `None` when disabled.
    pub fn effective_volume(&self, sound_id: &str) -> Option<f64> {
        self.tracks
            .get(sound_id)
            .map(|track| clamp_volume(track.volume * self.master_volume))
    }

    /// Enables a disabled track (default volume, playing) or disables an
    /// enabled one, discarding its record and stopping playback.
    #[tracing::instrument(skip(self, store, playback, sound), fields(sound_id = %sound.id))]
    pub fn toggle_track(&mut self, store: &mut dyn Store, playback: &mut dyn Playback, sound: &Sound) {
        if self.tracks.remove(&sound.id).is_some() {
            playback.stop(&sound.id);
            debug!("track disabled");
        } else {
            self.tracks.insert(
                sound.id.clone(),
                ActiveTrack {
                    id: sound.id.clone(),
                    volume: DEFAULT_TRACK_VOLUME,
                    is_playing: true,
                },
            );
            self.start_track(playback, &sound.id, &sound.path);
            debug!("track enabled");
        }
        self.save(store);
    }

    pub fn set_track_volume(
        &mut self,
        store: &mut dyn Store,
        playback: &mut dyn Playback,
        sound_id: &str,
        volume: f64,
    ) -> bool {
        let master = self.master_volume;
        let Some(track) = self.tracks.get_mut(sound_id) else {
            warn!(sound_id, "volume change for disabled track");
            return false;
        };
        track.volume = clamp_volume(volume);
        playback.set_volume(sound_id, clamp_volume(track.volume * master));
        self.save(store);
        true
    }

    /// Master volume scales every track's effective loudness without
    /// touching the individually stored volumes.
    pub fn set_master_volume(
        &mut self,
        store: &mut dyn Store,
        playback: &mut dyn Playback,
        volume: f64,
    ) {
        self.master_volume = clamp_volume(volume);
        for (id, track) in &self.tracks {
            playback.set_volume(id, clamp_volume(track.volume * self.master_volume));
        }
        self.save(store);
    }

    /// Pauses everything if any track is playing, otherwise resumes all
    /// enabled tracks. Each request is independent and best-effort.
    #[tracing::instrument(skip(self, store, playback, sounds))]
    pub fn toggle_master_playback(
        &mut self,
        store: &mut dyn Store,
        playback: &mut dyn Playback,
        sounds: &[Sound],
    ) {
        let resume = !self.any_playing();
        let ids: Vec<String> = self.tracks.keys().cloned().collect();
        for id in ids {
            if let Some(track) = self.tracks.get_mut(&id) {
                track.is_playing = resume;
            }
            if resume {
                let path = sounds
                    .iter()
                    .find(|sound| sound.id == id)
                    .map(|sound| sound.path.clone())
                    .unwrap_or_default();
                self.start_track(playback, &id, &path);
            } else {
                playback.pause(&id);
            }
        }
        self.save(store);
    }

    fn start_track(&self, playback: &mut dyn Playback, id: &str, path: &str) {
        if let Some(effective) = self.effective_volume(id) {
            playback.set_volume(id, effective);
        }
        if let Err(err) = playback.play(id, path) {
            // Playback refusal is per-track; the rest of the mixer carries on.
            warn!(track = id, error = %err, "playback start refused");
        }
    }

    fn save(&self, store: &mut dyn Store) {
        store::save_json(store, TRACKS_KEY, &self.tracks);
        store::save_json(store, MASTER_VOLUME_KEY, &self.master_volume);
    }
}

fn clamp_volume(volume: f64) -> f64 {
    volume.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{ActiveTrack, AudioMixer, Playback};
    use crate::catalog::Sound;
    use crate::store::MemoryStore;

    /// Records requests; optionally refuses every `play`.
    #[derive(Default)]
    struct FakePlayback {
        refuse_play: bool,
        playing: BTreeMap<String, bool>,
        volumes: BTreeMap<String, f64>,
    }

    impl Playback for FakePlayback {
        fn play(&mut self, track_id: &str, _path: &str) -> anyhow::Result<()> {
            if self.refuse_play {
                return Err(anyhow::anyhow!("autoplay blocked"));
            }
            self.playing.insert(track_id.to_string(), true);
            Ok(())
        }

        fn pause(&mut self, track_id: &str) {
            self.playing.insert(track_id.to_string(), false);
        }

        fn set_volume(&mut self, track_id: &str, volume: f64) {
            self.volumes.insert(track_id.to_string(), volume);
        }

        fn stop(&mut self, track_id: &str) {
            self.playing.remove(track_id);
        }
    }

    fn sound(name: &str) -> Sound {
        Sound {
            id: format!("custom-{name}.mp3"),
            name: name.to_string(),
            path: format!("/static/sounds/custom/{name}.mp3"),
        }
    }

    #[test]
    fn toggle_enables_with_defaults_then_discards() {
        let mut store = MemoryStore::new();
        let mut playback = FakePlayback::default();
        let mut mixer = AudioMixer::load(&store);
        let rain = sound("rain");

        mixer.toggle_track(&mut store, &mut playback, &rain);
        let track = mixer.tracks().get(&rain.id).expect("enabled");
        assert_eq!(track.volume, 0.5);
        assert!(track.is_playing);

        mixer.set_track_volume(&mut store, &mut playback, &rain.id, 0.9);
        mixer.toggle_track(&mut store, &mut playback, &rain);
        assert!(!mixer.is_enabled(&rain.id));

        // Volume is forgotten, not retained: re-enabling starts at default.
        mixer.toggle_track(&mut store, &mut playback, &rain);
        let track = mixer.tracks().get(&rain.id).expect("re-enabled");
        assert_eq!(track.volume, 0.5);
    }

    #[test]
    fn effective_volume_is_product_of_track_and_master() {
        let mut store = MemoryStore::new();
        let mut playback = FakePlayback::default();
        let mut mixer = AudioMixer::load(&store);
        let rain = sound("rain");

        mixer.toggle_track(&mut store, &mut playback, &rain);
        mixer.set_track_volume(&mut store, &mut playback, &rain.id, 0.5);
        mixer.set_master_volume(&mut store, &mut playback, 0.6);

        let effective = mixer.effective_volume(&rain.id).expect("enabled");
        assert!((effective - 0.3).abs() < 1e-9);
        assert!((playback.volumes[&rain.id] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn volumes_clamp_into_unit_range() {
        let mut store = MemoryStore::new();
        let mut playback = FakePlayback::default();
        let mut mixer = AudioMixer::load(&store);
        let rain = sound("rain");

        mixer.toggle_track(&mut store, &mut playback, &rain);
        mixer.set_track_volume(&mut store, &mut playback, &rain.id, 3.5);
        assert_eq!(mixer.tracks()[&rain.id].volume, 1.0);

        mixer.set_master_volume(&mut store, &mut playback, -1.0);
        assert_eq!(mixer.master_volume(), 0.0);
        assert_eq!(mixer.effective_volume(&rain.id), Some(0.0));
    }

    #[test]
    fn master_toggle_pauses_all_then_resumes_all() {
        let mut store = MemoryStore::new();
        let mut playback = FakePlayback::default();
        let mut mixer = AudioMixer::load(&store);
        let sounds = vec![sound("rain"), sound("forest")];

        mixer.toggle_track(&mut store, &mut playback, &sounds[0]);
        mixer.toggle_track(&mut store, &mut playback, &sounds[1]);
        assert!(mixer.any_playing());

        mixer.toggle_master_playback(&mut store, &mut playback, &sounds);
        assert!(!mixer.any_playing());

        mixer.toggle_master_playback(&mut store, &mut playback, &sounds);
        assert!(mixer.any_playing());
        assert!(mixer.tracks().values().all(|track| track.is_playing));
    }

    #[test]
    fn refused_play_leaves_other_tracks_alone() {
        let mut store = MemoryStore::new();
        let mut playback = FakePlayback::default();
        let mut mixer = AudioMixer::load(&store);
        let rain = sound("rain");
        let forest = sound("forest");

        mixer.toggle_track(&mut store, &mut playback, &rain);

        playback.refuse_play = true;
        mixer.toggle_track(&mut store, &mut playback, &forest);

        // The refusal is swallowed: both tracks stay logically enabled.
        assert!(mixer.is_enabled(&rain.id));
        assert!(mixer.is_enabled(&forest.id));
        assert!(mixer.tracks()[&forest.id].is_playing);
    }

    #[test]
    fn state_survives_reload() {
        let mut store = MemoryStore::new();
        let mut playback = FakePlayback::default();
        let mut mixer = AudioMixer::load(&store);
        let rain = sound("rain");

        mixer.toggle_track(&mut store, &mut playback, &rain);
        mixer.set_track_volume(&mut store, &mut playback, &rain.id, 0.7);
        mixer.set_master_volume(&mut store, &mut playback, 0.4);

        let reloaded = AudioMixer::load(&store);
        assert_eq!(reloaded.master_volume(), 0.4);
        assert_eq!(
            reloaded.tracks().get(&rain.id),
            Some(&ActiveTrack {
                id: rain.id.clone(),
                volume: 0.7,
                is_playing: true,
            })
        );
    }
}
