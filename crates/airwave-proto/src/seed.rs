//! Station seed files (TOML `[[station]]` tables or m3u playlists) used to
//! populate the local backend.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::config::Config;
use crate::model::RadioStation;

/// Stations shipped with the binary, used when no seed file is configured.
pub const BUNDLED_STATIONS: &str = include_str!("../stations.toml");

/// Intermediate struct matching the TOML `[[station]]` table, kept apart from
/// `RadioStation` so the file format can diverge from the table rows.
#[derive(Debug, serde::Deserialize)]
struct TomlStationFile {
    station: Vec<TomlStation>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlStation {
    #[serde(default)]
    id: Option<String>,
    name: String,
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    image: String,
    #[serde(default)]
    featured: bool,
    #[serde(default)]
    listeners: u64,
}

pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<Vec<RadioStation>> {
    let file: TomlStationFile = toml::from_str(content)?;
    let mut ids = IdAllocator::default();
    let stations = file
        .station
        .into_iter()
        .map(|s| RadioStation {
            id: ids.allocate(s.id.as_deref().unwrap_or(&s.name)),
            name: s.name,
            stream_url: s.url,
            image_url: non_empty(s.image),
            description: non_empty(s.description),
            category: s
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            is_featured: s.featured,
            listeners: s.listeners,
            created_at: None,
            updated_at: None,
        })
        .collect();
    Ok(stations)
}

pub fn parse_m3u_from_str(content: &str) -> Vec<RadioStation> {
    let mut stations = Vec::new();
    let mut ids = IdAllocator::default();
    let mut pending_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            if let Some(comma_idx) = rest.find(',') {
                pending_name = Some(rest[comma_idx + 1..].trim().to_string());
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let url = line.to_string();
        let name = pending_name.take().unwrap_or_else(|| url.clone());

        stations.push(RadioStation {
            id: ids.allocate(&name),
            name,
            stream_url: url,
            ..RadioStation::default()
        });
    }

    stations
}

pub fn load_stations_from_toml(path: &Path) -> anyhow::Result<Vec<RadioStation>> {
    let content = std::fs::read_to_string(path)?;
    parse_stations_from_toml_str(&content)
}

/// Resolve the seed list: configured TOML file, then the m3u source (file or
/// URL), then the bundled list.
pub async fn load_seed(config: &Config) -> Vec<RadioStation> {
    let toml_path = &config.stations.seed_toml;
    if toml_path.exists() {
        match load_stations_from_toml(toml_path) {
            Ok(s) => {
                info!("Loaded {} seed stations from {}", s.len(), toml_path.display());
                return s;
            }
            Err(e) => warn!("Failed to parse seed stations {}: {}", toml_path.display(), e),
        }
    }

    let source = config.stations.seed_m3u.trim();
    if !source.is_empty() {
        let loaded = if source.starts_with("http://") || source.starts_with("https://") {
            fetch_m3u_url(source).await
        } else {
            std::fs::read_to_string(source)
                .map(|c| parse_m3u_from_str(&c))
                .map_err(anyhow::Error::from)
        };
        match loaded {
            Ok(s) if !s.is_empty() => {
                info!("Loaded {} seed stations from m3u {}", s.len(), source);
                return s;
            }
            Ok(_) => warn!("m3u seed {} has no entries", source),
            Err(e) => warn!("Failed to load m3u seed {}: {}", source, e),
        }
    }

    match parse_stations_from_toml_str(BUNDLED_STATIONS) {
        Ok(s) => s,
        Err(e) => {
            warn!("Bundled station list is invalid: {}", e);
            Vec::new()
        }
    }
}

async fn fetch_m3u_url(url: &str) -> anyhow::Result<Vec<RadioStation>> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }
    let text = response.text().await?;
    Ok(parse_m3u_from_str(&text))
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Stable slug ids, so favorites survive a reseed.
#[derive(Default)]
struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    fn allocate(&mut self, source: &str) -> String {
        let base = slugify(source);
        let base = if base.is_empty() { "station".to_string() } else { base };
        let mut candidate = base.clone();
        let mut n = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        candidate
    }
}

pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}
