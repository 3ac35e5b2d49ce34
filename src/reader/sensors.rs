//! hardware sensors, from `/sys/class/hwmon`.
//!
//! every chip's temperatures are read. amdgpu chips also report their power draw and their
//! video memory use.

use {
    super::{Context, Reader, ReaderKind},
    crate::{
        delta::{FieldKind::Gauge, FieldSpec},
        error::ReaderError,
        sample::{Entity, EntityId, RawSample},
    },
    std::path::{Path, PathBuf},
    tracing::debug,
};

/// reads every `temp*_input` of every hwmon chip, and the power and memory figures of amdgpu
/// chips.
#[derive(Debug, Default)]
pub struct SensorsReader;

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("millicelsius", Gauge),
    ("critical", Gauge),
    ("microwatts", Gauge),
    ("microwatts_cap", Gauge),
    ("vram_used", Gauge),
    ("vram_total", Gauge),
]);

impl SensorsReader {
    const PATH: &str = "/sys/class/hwmon";
    const AMDGPU: &str = "amdgpu";
}

impl Reader for SensorsReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Sensors
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let time = ctx.clock.now();
        let root = Path::new(Self::PATH);
        let chips = ctx
            .fs
            .read_dir(root)
            .map_err(|error| ReaderError::unreadable(root, error))?;

        let mut sample = RawSample::new(time);
        for chip in chips {
            let dir = root.join(&chip);
            let name = read_trimmed(ctx, dir.join("name")).unwrap_or_else(|| chip.clone());
            let Ok(entries) = ctx.fs.read_dir(&dir) else {
                continue;
            };

            for input in entries.iter().filter(|entry| is_temperature_input(entry)) {
                let Some(sensor) = input.strip_suffix("_input") else {
                    continue;
                };
                let Some(temperature) = read_value(ctx, dir.join(input)) else {
                    debug!(%chip, %sensor, "skipping unreadable temperature");
                    continue;
                };

                let label = read_trimmed(ctx, dir.join(format!("{sensor}_label")))
                    .unwrap_or_else(|| sensor.to_owned());
                let mut entity = Entity::new()
                    .with("millicelsius", temperature)
                    .with_label(name.clone());
                if let Some(critical) = read_value(ctx, dir.join(format!("{sensor}_crit"))) {
                    entity.set("critical", critical);
                }
                insert(&mut sample, &name, &chip, &label, entity);
            }

            if name == Self::AMDGPU {
                Self::amdgpu(ctx, &dir, &mut sample, &name, &chip);
            }
        }

        Ok(sample)
    }
}

impl SensorsReader {
    /// adds the power draw and the video memory use of an amdgpu chip.
    fn amdgpu(ctx: &Context<'_>, dir: &Path, sample: &mut RawSample, name: &str, chip: &str) {
        if let Some(power) = read_value(ctx, dir.join("power1_average")) {
            let mut entity = Entity::new()
                .with("microwatts", power)
                .with_label(name.to_owned());
            if let Some(cap) = read_value(ctx, dir.join("power1_cap")) {
                entity.set("microwatts_cap", cap);
            }
            insert(sample, name, chip, "power", entity);
        }

        let device = dir.join("device");
        let used = read_value(ctx, device.join("mem_info_vram_used"));
        let total = read_value(ctx, device.join("mem_info_vram_total"));
        if let (Some(used), Some(total)) = (used, total) {
            let entity = Entity::new()
                .with("vram_used", used)
                .with("vram_total", total)
                .with_label(name.to_owned());
            insert(sample, name, chip, "vram", entity);
        }
    }
}

/// adds a reading as `name/label`.
///
/// two chips of the same model share a name; the second falls back to the chip's directory.
fn insert(sample: &mut RawSample, name: &str, chip: &str, label: &str, entity: Entity) {
    let mut id = EntityId::from(format!("{name}/{label}"));
    if sample.get(&id).is_some() {
        id = EntityId::from(format!("{chip}/{label}"));
    }
    sample.insert(id, entity);
}

fn is_temperature_input(entry: &str) -> bool {
    entry
        .strip_prefix("temp")
        .and_then(|rest| rest.strip_suffix("_input"))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

fn read_trimmed(ctx: &Context<'_>, path: PathBuf) -> Option<String> {
    ctx.fs
        .read_to_string(&path)
        .ok()
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// reads an integer reading. readings below zero are clamped, the panel has no use for them.
fn read_value(ctx: &Context<'_>, path: PathBuf) -> Option<u64> {
    let text = read_trimmed(ctx, path)?;
    let value = text.parse::<i64>().ok()?;
    Some(u64::try_from(value).unwrap_or(0))
}
