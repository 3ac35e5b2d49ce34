use {
    crate::{
        delta::{DeltaSet, FieldSpec, compute_deltas},
        error::{ReaderError, StartupError},
        reader::{Context, Reader, ReaderKind},
        sample::RawSample,
        source::{Clock, Filesystem, Helper, ProcFs, SystemClock, SystemHelper},
    },
    std::collections::{BTreeMap, BTreeSet},
    tracing::{debug, info, warn},
};

/// observes kernel statistics.
///
/// the sentinel owns every reader, and the last two samples each of them produced.
pub struct Sentinel<C = SystemClock, F = ProcFs, H = SystemHelper> {
    /// the clock being used to measure time.
    clock: C,
    /// the underlying source of kernel statistics.
    fs: F,
    /// runs helper programs.
    helper: H,
    readers: Vec<Box<dyn Reader>>,
    store: BTreeMap<ReaderKind, Generations>,
    /// readers whose last attempt failed.
    unavailable: BTreeSet<ReaderKind>,
}

/// the two most recent samples of one reader.
#[derive(Debug, Default)]
struct Generations {
    previous: Option<RawSample>,
    current: Option<RawSample>,
}

/// the delta sets of every reader that produced a sample this tick.
#[derive(Debug, Default)]
pub struct Observation {
    sets: BTreeMap<ReaderKind, DeltaSet>,
}

// === impl Sentinel ===

impl Sentinel {
    /// creates a new [`Sentinel`], reading the live system.
    pub fn new(readers: Vec<Box<dyn Reader>>) -> Self {
        Self::with_sources(SystemClock, ProcFs, SystemHelper, readers)
    }
}

impl<C, F, H> Sentinel<C, F, H>
where
    C: Clock,
    F: Filesystem,
    H: Helper,
{
    pub fn with_sources(clock: C, fs: F, helper: H, readers: Vec<Box<dyn Reader>>) -> Self {
        Self {
            clock,
            fs,
            helper,
            readers,
            store: BTreeMap::new(),
            unavailable: BTreeSet::new(),
        }
    }

    /// takes the first sample of every reader.
    ///
    /// fails if a mandatory source cannot be read. other readers are allowed to fail, and are
    /// retried every tick.
    pub fn prime(&mut self) -> Result<(), StartupError> {
        let Self {
            clock,
            fs,
            helper,
            readers,
            store,
            unavailable,
        } = self;
        let ctx = Context {
            fs: &*fs,
            clock: &*clock,
            helper: &*helper,
        };

        for reader in readers.iter_mut() {
            let kind = reader.kind();
            match reader.sample(&ctx) {
                Ok(sample) => store.entry(kind).or_default().rotate(sample),
                Err(source) if kind.is_mandatory() => {
                    return Err(StartupError::Mandatory { kind, source });
                }
                Err(error) => {
                    Self::unavailable(unavailable, kind, &error);
                    store.remove(&kind);
                }
            }
        }

        Ok(())
    }

    /// samples every reader, and returns what changed since the previous call.
    ///
    /// every reader is sampled before any history is rotated, and deltas are computed last. a
    /// reader that fails is left out of the observation, and its history is forgotten, so that
    /// its next sample is never compared to one older than the previous tick.
    pub fn observe(&mut self) -> Observation {
        let Self {
            clock,
            fs,
            helper,
            readers,
            store,
            unavailable,
        } = self;
        let ctx = Context {
            fs: &*fs,
            clock: &*clock,
            helper: &*helper,
        };

        let samples = readers
            .iter_mut()
            .map(|reader| (reader.kind(), reader.sample(&ctx)))
            .collect::<Vec<_>>();

        for (kind, sample) in samples {
            match sample {
                Ok(sample) => {
                    if unavailable.remove(&kind) {
                        info!(reader = %kind, "source is available again");
                    }
                    store.entry(kind).or_default().rotate(sample);
                }
                Err(error) => {
                    Self::unavailable(unavailable, kind, &error);
                    if let Some(generations) = store.get_mut(&kind) {
                        generations.clear();
                    }
                }
            }
        }

        let sets = readers
            .iter()
            .filter_map(|reader| {
                let kind = reader.kind();
                let set = store.get(&kind)?.deltas(reader.fields())?;
                Some((kind, set))
            })
            .collect();

        Observation { sets }
    }

    /// records a failed reader, warning only the first time in a row it fails.
    fn unavailable(unavailable: &mut BTreeSet<ReaderKind>, kind: ReaderKind, error: &ReaderError) {
        if unavailable.insert(kind) {
            warn!(reader = %kind, %error, retryable = error.is_retryable(), "source is unavailable");
        } else {
            debug!(reader = %kind, %error, "source is still unavailable");
        }
    }

    /// returns the number of samples held for a reader.
    #[cfg(test)]
    fn depth(&self, kind: ReaderKind) -> usize {
        self.store.get(&kind).map_or(0, Generations::depth)
    }
}

// === impl Generations ===

impl Generations {
    /// makes `sample` the current generation, discarding the oldest.
    fn rotate(&mut self, sample: RawSample) {
        let Self { previous, current } = self;
        *previous = current.replace(sample);
    }

    fn clear(&mut self) {
        let Self { previous, current } = self;
        *previous = None;
        *current = None;
    }

    fn deltas(&self, fields: &FieldSpec) -> Option<DeltaSet> {
        let Self { previous, current } = self;
        current
            .as_ref()
            .map(|current| compute_deltas(previous.as_ref(), current, fields))
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        let Self { previous, current } = self;
        usize::from(previous.is_some()) + usize::from(current.is_some())
    }
}

// === impl Observation ===

impl Observation {
    pub fn get(&self, kind: ReaderKind) -> Option<&DeltaSet> {
        self.sets.get(&kind)
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, kind: ReaderKind, set: DeltaSet) {
        self.sets.insert(kind, set);
    }
}
