//! Loading of line-oriented preset config files.
//!
//! Torque-curve presets and inertia response presets share one format:
//! blank lines and lines starting with `;` are comments, a single
//! comma-free token opens a new named curve, and a `x, y` pair appends a
//! control point to the current curve. The parsed table is a plain value
//! handed to the consuming subsystem at construction.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec2;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct PresetCurve {
    pub name: String,
    pub points: Vec<Vec2>,
}

/// Read-only name -> point-list table, in file order.
#[derive(Clone, Debug, Default)]
pub struct PresetTable {
    curves: Vec<PresetCurve>,
}

impl PresetTable {
    pub fn new() -> Self { Self::default() }

    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();
        let mut current: Option<usize> = None;
        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let args: Vec<&str> = line.split(',').map(str::trim).collect();
            if args.len() == 1 {
                current = Some(table.open_curve(line));
                continue;
            }
            if args.len() != 2 {
                warn!(line, "preset line has neither 1 nor 2 tokens, skipped");
                continue;
            }
            let Some(idx) = current else {
                warn!(line, "preset point before any curve name, skipped");
                continue;
            };
            match (args[0].parse::<f32>(), args[1].parse::<f32>()) {
                (Ok(x), Ok(y)) => table.curves[idx].points.push(Vec2::new(x, y)),
                _ => warn!(line, "preset point is not numeric, skipped"),
            }
        }
        table
    }

    fn open_curve(&mut self, name: &str) -> usize {
        if let Some(i) = self.curves.iter().position(|c| c.name == name) {
            return i;
        }
        self.curves.push(PresetCurve { name: name.to_owned(), points: Vec::new() });
        self.curves.len() - 1
    }

    pub fn add_point(&mut self, name: &str, point: Vec2) {
        let i = self.open_curve(name);
        self.curves[i].points.push(point);
    }

    pub fn get(&self, name: &str) -> Option<&[Vec2]> {
        self.curves.iter().find(|c| c.name == name).map(|c| c.points.as_slice())
    }

    pub fn curves(&self) -> &[PresetCurve] { &self.curves }
    pub fn len(&self) -> usize { self.curves.len() }
    pub fn is_empty(&self) -> bool { self.curves.is_empty() }
}

pub fn load_preset_file(path: &Path) -> Result<PresetTable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading preset file {}", path.display()))?;
    Ok(PresetTable::parse(&text))
}
