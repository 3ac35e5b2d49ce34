//! pressure stall information, from `/proc/pressure`.

use {
    super::{Context, Reader, ReaderKind, number, read},
    crate::{
        delta::{
            FieldKind::{Counter, Gauge},
            FieldSpec,
        },
        error::{ParseError, ReaderError},
        sample::{Entity, RawSample},
    },
    tracing::debug,
};

/// reads the stall averages and totals of the cpu, memory, and io resources.
#[derive(Debug, Default)]
pub struct PressureReader;

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("some_avg10", Gauge),
    ("some_avg60", Gauge),
    ("some_avg300", Gauge),
    ("some_total", Counter),
    ("full_avg10", Gauge),
    ("full_avg60", Gauge),
    ("full_avg300", Gauge),
    ("full_total", Counter),
]);

/// the resources with a pressure file.
pub const RESOURCES: [&str; 3] = ["cpu", "memory", "io"];

impl Reader for PressureReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Pressure
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let time = ctx.clock.now();
        let mut sample = RawSample::new(time);
        let mut first_error = None;

        for resource in RESOURCES {
            let text = match read(ctx, format!("/proc/pressure/{resource}")) {
                Ok(text) => text,
                Err(error) => {
                    first_error.get_or_insert(error);
                    continue;
                }
            };
            match parse(&text) {
                Ok(entity) => sample.insert(resource, entity),
                Err(error) => debug!(%resource, %error, "skipping malformed pressure file"),
            }
        }

        match first_error {
            // a kernel without psi support has none of the files.
            Some(error) if sample.is_empty() => Err(error),
            _ => Ok(sample),
        }
    }
}

/// parses a pressure file:
///
/// ```text
/// some avg10=0.12 avg60=0.05 avg300=0.01 total=123456
/// full avg10=0.00 avg60=0.00 avg300=0.00 total=0
/// ```
///
/// averages are percentages, stored in hundredths. totals are microseconds.
fn parse(text: &str) -> Result<Entity, ParseError> {
    let mut entity = Entity::new();
    for line in text.lines() {
        let mut words = line.split_whitespace();
        let Some(scope @ ("some" | "full")) = words.next() else {
            continue;
        };

        let mut seen = 0;
        for word in words {
            let Some((key, value)) = word.split_once('=') else {
                continue;
            };
            let Some(field) = field_name(scope, key) else {
                continue;
            };
            let value = if key == "total" {
                number(field, value)?
            } else {
                hundredths(field, value)?
            };
            entity.set(field, value);
            seen += 1;
        }

        if seen < 4 {
            return Err(ParseError::Malformed(line.to_owned()));
        }
    }

    if entity.is_empty() {
        return Err(ParseError::MissingField("some_avg10"));
    }
    Ok(entity)
}

fn field_name(scope: &str, key: &str) -> Option<&'static str> {
    Some(match (scope, key) {
        ("some", "avg10") => "some_avg10",
        ("some", "avg60") => "some_avg60",
        ("some", "avg300") => "some_avg300",
        ("some", "total") => "some_total",
        ("full", "avg10") => "full_avg10",
        ("full", "avg60") => "full_avg60",
        ("full", "avg300") => "full_avg300",
        ("full", "total") => "full_total",
        _ => return None,
    })
}

/// parses a non-negative decimal into hundredths.
fn hundredths(field: &'static str, value: &str) -> Result<u64, ParseError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| (v * 100.0).round() as u64)
        .ok_or_else(|| ParseError::InvalidNumber {
            field,
            value: value.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            reader::sample_mock,
            sample::EntityId,
            source::{MockFs, MockHelper},
        },
    };

    const MEMORY: &str = "\
some avg10=1.53 avg60=0.87 avg300=0.20 total=2469513
full avg10=0.00 avg60=0.00 avg300=0.00 total=1033322
";

    #[test]
    fn parses_averages_in_hundredths() {
        let memory = parse(MEMORY).unwrap();
        assert_eq!(memory.get("some_avg10"), Some(153));
        assert_eq!(memory.get("some_avg300"), Some(20));
        assert_eq!(memory.get("some_total"), Some(2469513));
        assert_eq!(memory.get("full_total"), Some(1033322));
    }

    #[test]
    fn older_kernels_lack_full_cpu_line() {
        let cpu = parse("some avg10=0.10 avg60=0.20 avg300=0.30 total=400\n").unwrap();
        assert_eq!(cpu.get("some_avg60"), Some(20));
        assert_eq!(cpu.get("full_avg10"), None);
    }

    #[test]
    fn missing_total_is_a_parse_failure() {
        let err = parse("some avg10=0.10 avg60=0.20 avg300=0.30\n").unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn extra_keys_are_ignored() {
        let cpu = parse("some avg10=0.10 avg60=0.20 avg300=0.30 avg900=1.0 total=400\n").unwrap();
        assert_eq!(cpu.get("some_total"), Some(400));
    }

    #[test]
    fn kernel_without_psi_is_unreadable() {
        let err = sample_mock(&mut PressureReader, &MockFs::default(), &MockHelper::default())
            .unwrap_err();
        assert!(matches!(err, ReaderError::Unreadable { .. }));
    }

    #[test]
    fn one_malformed_resource_is_dropped() {
        let fs = MockFs::default()
            .with("/proc/pressure/cpu", "some avg10=x avg60=0 avg300=0 total=0\n")
            .with("/proc/pressure/memory", MEMORY)
            .with("/proc/pressure/io", MEMORY);
        let sample = sample_mock(&mut PressureReader, &fs, &MockHelper::default()).unwrap();
        assert!(sample.get(&EntityId::from("cpu")).is_none());
        assert!(sample.get(&EntityId::from("memory")).is_some());
        assert!(sample.get(&EntityId::from("io")).is_some());
    }
}
