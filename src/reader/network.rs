//! per-interface traffic, from `/proc/net/dev`.

use {
    super::{Context, Reader, ReaderKind, number, read, tokens},
    crate::{
        delta::{FieldKind::Counter, FieldSpec},
        error::{ParseError, ReaderError},
        sample::{Entity, RawSample},
    },
    tracing::debug,
};

/// reads network interface counters.
#[derive(Debug)]
pub struct NetworkReader {
    /// interfaces whose name starts with one of these are skipped.
    ignored: Vec<String>,
}

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("rx_bytes", Counter),
    ("rx_packets", Counter),
    ("rx_drops", Counter),
    ("tx_bytes", Counter),
    ("tx_packets", Counter),
    ("tx_drops", Counter),
]);

/// columns of an interface line after its name, and the fields they populate.
const COLUMNS: [(usize, &str); 6] = [
    (0, "rx_bytes"),
    (1, "rx_packets"),
    (3, "rx_drops"),
    (8, "tx_bytes"),
    (9, "tx_packets"),
    (11, "tx_drops"),
];

impl NetworkReader {
    const PATH: &str = "/proc/net/dev";

    pub fn new(ignored: Vec<String>) -> Self {
        Self { ignored }
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignored.iter().any(|prefix| name.starts_with(prefix))
    }
}

impl Reader for NetworkReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Network
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let time = ctx.clock.now();
        let text = read(ctx, Self::PATH)?;

        let mut sample = RawSample::new(time);
        // the first two lines are headers.
        for line in text.lines().skip(2) {
            let Some((name, counters)) = line.split_once(':') else {
                debug!(%line, "skipping malformed interface line");
                continue;
            };
            let name = name.trim();
            if self.is_ignored(name) {
                continue;
            }
            match parse_counters(counters) {
                Ok(interface) => sample.insert(name, interface),
                Err(error) => debug!(%name, %error, "skipping malformed interface"),
            }
        }

        Ok(sample)
    }
}

fn parse_counters(counters: &str) -> Result<Entity, ParseError> {
    let tokens = tokens(counters);
    let expected = 12;
    if tokens.len() < expected {
        return Err(ParseError::Truncated {
            expected,
            found: tokens.len(),
        });
    }

    COLUMNS
        .iter()
        .try_fold(Entity::new(), |interface, &(column, field)| {
            Ok(interface.with(field, number(field, tokens[column])?))
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

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1234567    1000    0    0    0     0          0         0  1234567    1000    0    0    0     0       0          0
  eth0:98765432   50000    0    7    0     0          0       100 12345678   40000    0    3    0     0       0          0
wlan0: 1 2 3
";

    fn reader() -> NetworkReader {
        NetworkReader::new(vec!["lo".to_owned()])
    }

    #[test]
    fn parses_interfaces() {
        let fs = MockFs::default().with("/proc/net/dev", NET_DEV);
        let sample = sample_mock(&mut reader(), &fs, &MockHelper::default()).unwrap();

        let eth0 = sample.get(&EntityId::from("eth0")).unwrap();
        assert_eq!(eth0.get("rx_bytes"), Some(98765432));
        assert_eq!(eth0.get("rx_drops"), Some(7));
        assert_eq!(eth0.get("tx_bytes"), Some(12345678));
        assert_eq!(eth0.get("tx_packets"), Some(40000));
        assert_eq!(eth0.get("tx_drops"), Some(3));
    }

    #[test]
    fn ignored_and_truncated_interfaces_are_skipped() {
        let fs = MockFs::default().with("/proc/net/dev", NET_DEV);
        let sample = sample_mock(&mut reader(), &fs, &MockHelper::default()).unwrap();
        assert!(sample.get(&EntityId::from("lo")).is_none());
        assert!(sample.get(&EntityId::from("wlan0")).is_none());
        assert_eq!(sample.len(), 1);
    }

    #[test]
    fn nothing_ignored() {
        let fs = MockFs::default().with("/proc/net/dev", NET_DEV);
        let mut reader = NetworkReader::new(Vec::new());
        let sample = sample_mock(&mut reader, &fs, &MockHelper::default()).unwrap();
        assert!(sample.get(&EntityId::from("lo")).is_some());
    }
}
