//! Per-(species, season) foliage palettes stored as small CSV files.
//!
//! ```text
//! Channel,R,G,B,A
//! Channel0,0.409,0.509,0.344,1
//! Channel1,0.335,0.462,0.265,1
//! Channel2,0.945,0.941,0.957,1
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::components::{ColorSet, Rgba, Season};
use crate::error::PaletteError;

pub const PALETTE_FOLDER: &str = "FoliageColorData";
const HEADER: &str = "Channel,R,G,B,A";

pub fn palette_path(dir: &Path, species: &str, season: Season) -> PathBuf {
    dir.join(PALETTE_FOLDER)
        .join(format!("{species}-{}{}.csv", season.index(), season.name()))
}

pub fn export(path: &Path, colors: &ColorSet) -> Result<(), PaletteError> {
    let write_err = |source| PaletteError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut text = String::from(HEADER);
    text.push('\n');
    for (index, channel) in colors.channels().iter().enumerate() {
        text.push_str(&format!(
            "Channel{index},{},{},{},{}\n",
            channel.r, channel.g, channel.b, channel.a
        ));
    }
    fs::write(path, text).map_err(write_err)
}

/// Writes the default palette for `species`/`season` unless a file is already
/// there. Returns whether a file was written.
pub fn export_default(
    dir: &Path,
    species: &str,
    season: Season,
    colors: &ColorSet,
) -> Result<bool, PaletteError> {
    let path = palette_path(dir, species, season);
    if path.exists() {
        return Ok(false);
    }
    export(&path, colors)?;
    Ok(true)
}

/// Reads a palette. A missing file is `Ok(None)`; an unreadable or malformed
/// one is an error and the caller keeps whatever colors it had.
pub fn import(path: &Path) -> Result<Option<ColorSet>, PaletteError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|source| PaletteError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(path, &text).map(Some)
}

fn parse(path: &Path, text: &str) -> Result<ColorSet, PaletteError> {
    let malformed = |line: usize, reason: String| PaletteError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut rows = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    match rows.next() {
        Some((_, header)) if header.eq_ignore_ascii_case(HEADER) => {}
        Some((line, other)) => return Err(malformed(line, format!("unexpected header {other:?}"))),
        None => return Err(malformed(1, "empty file".into())),
    }

    let mut channels = [Rgba::new(0.0, 0.0, 0.0, 1.0); 3];
    for (expected, slot) in channels.iter_mut().enumerate() {
        let (line, row) = rows
            .next()
            .ok_or_else(|| malformed(expected + 2, format!("missing Channel{expected} row")))?;
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() < 5 {
            return Err(malformed(line, format!("expected 5 fields, found {}", fields.len())));
        }
        let mut values = [0.0f32; 4];
        for (value, raw) in values.iter_mut().zip(&fields[1..5]) {
            *value = raw
                .parse::<f32>()
                .map_err(|err| malformed(line, format!("{raw:?}: {err}")))?;
        }
        *slot = Rgba::new(values[0], values[1], values[2], values[3]).clamped();
    }

    Ok(ColorSet {
        channel0: channels[0],
        channel1: channels[1],
        channel2: channels[2],
    })
}
