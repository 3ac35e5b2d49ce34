//! mounted filesystem usage, from `/proc/self/mountinfo` and `statvfs(3)`.

use {
    super::{Context, Reader, ReaderKind, read, tokens, unescape},
    crate::{
        delta::{FieldKind::Gauge, FieldSpec},
        error::{ParseError, ReaderError},
        sample::{Entity, RawSample},
    },
    std::{collections::HashSet, path::Path},
    tracing::debug,
};

/// reads the space figures of every block-backed mount.
///
/// each mount reports its own figures. a filesystem mounted beneath another is its own row, and
/// inherits nothing from its parent.
#[derive(Debug, Default)]
pub struct FilesystemReader;

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("size", Gauge),
    ("available", Gauge),
    ("used", Gauge),
]);

/// one line of the mount table.
#[derive(Debug, Eq, PartialEq)]
struct Mount<'a> {
    /// `major:minor` of the backing device.
    device: &'a str,
    mount_point: String,
    source: String,
}

impl FilesystemReader {
    const PATH: &str = "/proc/self/mountinfo";
}

impl Reader for FilesystemReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Filesystem
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let time = ctx.clock.now();
        let text = read(ctx, Self::PATH)?;

        let mut sample = RawSample::new(time);
        let mut seen = HashSet::new();
        for line in text.lines() {
            let mount = match parse_mount(line) {
                Ok(mount) => mount,
                Err(error) => {
                    debug!(%error, "skipping malformed mount");
                    continue;
                }
            };
            // pseudo filesystems have no path as their source.
            if !mount.source.starts_with('/') {
                continue;
            }
            // bind mounts and btrfs subvolumes share their device with an earlier mount.
            if !seen.insert(mount.device) {
                continue;
            }

            let usage = match ctx.fs.statvfs(Path::new(&mount.mount_point)) {
                Ok(usage) if usage.size > 0 => usage,
                Ok(_) => continue,
                Err(error) => {
                    debug!(mount_point = %mount.mount_point, %error, "skipping unqueryable mount");
                    continue;
                }
            };
            let entity = Entity::new()
                .with("size", usage.size)
                .with("available", usage.available)
                .with("used", usage.size.saturating_sub(usage.free))
                .with_label(mount.source);
            sample.insert(mount.mount_point, entity);
        }

        Ok(sample)
    }
}

/// parses one line of mountinfo:
///
/// ```text
/// 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
/// ```
///
/// the optional fields before the `-` separator vary in number.
fn parse_mount(line: &str) -> Result<Mount<'_>, ParseError> {
    let tokens = tokens(line);
    let malformed = || ParseError::Malformed(line.to_owned());

    let separator = tokens.iter().position(|t| *t == "-").ok_or_else(malformed)?;
    let (Some(device), Some(mount_point), Some(source)) = (
        tokens.get(2).copied().filter(|_| separator > 4),
        tokens.get(4).copied().filter(|_| separator > 4),
        tokens.get(separator + 2).copied(),
    ) else {
        return Err(malformed());
    };

    Ok(Mount {
        device,
        mount_point: unescape(mount_point),
        source: unescape(source),
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            reader::sample_mock,
            sample::EntityId,
            source::{MockFs, MockHelper, Usage},
        },
    };

    const MOUNTINFO: &str = "\
22 1 0:21 / /proc rw,nosuid,nodev,noexec,relatime shared:12 - proc proc rw
26 1 259:2 / / rw,relatime shared:1 - ext4 /dev/nvme0n1p2 rw
27 26 259:1 / /boot rw,relatime shared:2 - vfat /dev/nvme0n1p1 rw
28 26 259:2 /srv /srv/bind rw,relatime shared:1 - ext4 /dev/nvme0n1p2 rw
29 26 8:17 / /mnt/usb\\040stick rw,relatime - exfat /dev/sdb1 rw
30 26 8:33 / /mnt/gone rw,relatime - ext4 /dev/sdc1 rw
";

    fn fs() -> MockFs {
        let fs = MockFs::default().with("/proc/self/mountinfo", MOUNTINFO);
        let usage = |size, free, available| Usage {
            size,
            free,
            available,
        };
        fs.set_usage("/", usage(1000, 400, 300));
        fs.set_usage("/boot", usage(100, 90, 90));
        fs.set_usage("/srv/bind", usage(1000, 400, 300));
        fs.set_usage("/mnt/usb stick", usage(50, 10, 10));
        fs
    }

    #[test]
    fn lists_block_backed_mounts_once() {
        let sample = sample_mock(&mut FilesystemReader, &fs(), &MockHelper::default()).unwrap();
        let ids = sample.entities().map(|(id, _)| id.to_string()).collect::<Vec<_>>();
        assert_eq!(ids, ["/", "/boot", "/mnt/usb stick"]);

        let root = sample.get(&EntityId::from("/")).unwrap();
        assert_eq!(root.get("size"), Some(1000));
        assert_eq!(root.get("used"), Some(600));
        assert_eq!(root.get("available"), Some(300));
        assert_eq!(root.label(), Some("/dev/nvme0n1p2"));
    }

    #[test]
    fn parses_optional_fields() {
        const LINE: &str = "36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 shared:2 - ext3 /dev/root rw";
        let mount = parse_mount(LINE).unwrap();
        assert_eq!(
            mount,
            Mount {
                device: "98:0",
                mount_point: "/mnt2".to_owned(),
                source: "/dev/root".to_owned(),
            }
        );
    }

    #[test]
    fn rejects_truncated_lines() {
        assert!(parse_mount("36 35 98:0 /mnt1 /mnt2 rw - ext3").is_err());
        assert!(parse_mount("36 35 98:0").is_err());
    }
}
