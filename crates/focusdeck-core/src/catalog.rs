use std::cmp::Ordering;
use std::time::Duration;

use anyhow::{Context, anyhow};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

/// A playable ambient sound: id, display name, and static asset path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sound {
    pub id: String,
    pub name: String,
    pub path: String,
}

impl Sound {
    fn discovered(file: &str) -> Self {
        let name = file
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file)
            .to_string();
        Self {
            id: format!("custom-{file}"),
            name,
            path: format!("/static/sounds/custom/{file}"),
        }
    }
}

/// Noise colors keep this fixed order, between nature and brainwave tiers.
const NOISE_ORDER: [&str; 3] = ["white-noise", "pink", "brown"];
const BRAINWAVE_SOUNDS: [&str; 5] = ["alpha", "beta", "delta", "gamma", "theta"];

/// The library ships empty; discovery supplies every track. Kept as a merge
/// source so bundled sounds slot in ahead of discovered ones.
fn builtin_sounds() -> Vec<Sound> {
    Vec::new()
}

#[derive(Debug, Deserialize)]
struct SoundsResponse {
    sounds: Vec<String>,
}

/// Full catalog: built-ins plus discovered tracks, in display order.
pub fn all_sounds(url: &str) -> Vec<Sound> {
    let mut sounds = builtin_sounds();
    sounds.extend(discover(url));
    sounds.sort_by(compare_sounds);
    sounds
}

/// Queries the catalog service. Discovery is best-effort: any failure
/// (network, non-200, malformed body) yields an empty set, never an error.
#[tracing::instrument]
pub fn discover(url: &str) -> Vec<Sound> {
    match fetch(url) {
        Ok(sounds) => {
            debug!(count = sounds.len(), "discovered sounds");
            sounds
        }
        Err(err) => {
            warn!(error = %err, "sound discovery failed; continuing without custom sounds");
            Vec::new()
        }
    }
}

fn fetch(url: &str) -> anyhow::Result<Vec<Sound>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build http client")?;

    let response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to reach sound catalog at {url}"))?;
    if !response.status().is_success() {
        return Err(anyhow!("sound catalog returned {}", response.status()));
    }

    let parsed: SoundsResponse = response
        .json()
        .context("sound catalog returned malformed json")?;

    let audio_file = Regex::new(r"(?i)\.(mp3|wav|ogg)$").context("invalid audio filter")?;
    Ok(parsed
        .sounds
        .iter()
        .filter(|file| audio_file.is_match(file))
        .map(|file| Sound::discovered(file))
        .collect())
}

fn tier(sound: &Sound) -> u8 {
    if BRAINWAVE_SOUNDS.contains(&sound.name.as_str()) {
        2
    } else if NOISE_ORDER.contains(&sound.name.as_str()) {
        1
    } else {
        0
    }
}

/// Three-tier comparator: nature sounds alphabetical, then noise colors in
/// their fixed order, then brainwave frequencies alphabetical.
fn compare_sounds(a: &Sound, b: &Sound) -> Ordering {
    let (tier_a, tier_b) = (tier(a), tier(b));
    if tier_a != tier_b {
        return tier_a.cmp(&tier_b);
    }
    if tier_a == 1 {
        let index = |s: &Sound| NOISE_ORDER.iter().position(|n| *n == s.name);
        return index(a).cmp(&index(b));
    }
    a.name.cmp(&b.name)
}
