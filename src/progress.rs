use futures::{Stream, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};

/// A visual completion gauge owned by a single transfer.
///
/// Handles are passed into each transfer explicitly. Two transfers sharing one
/// handle will race on it; nothing here prevents that.
pub trait ProgressIndicator: Send + Sync {
    /// Create the gauge if absent, set it to 0 and make it visible.
    fn reset(&self);
    /// Update the gauge to `percent` (0..=100).
    fn set(&self, percent: f64);
    fn hide(&self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rounding {
    /// Report the raw fraction, as upload progress events do.
    Exact,
    /// Report whole percents.
    Nearest,
}

impl Rounding {
    fn apply(self, percent: f64) -> f64 {
        match self {
            Rounding::Exact => percent,
            Rounding::Nearest => percent.round(),
        }
    }
}

/// `done / total * 100`, or `None` when the total is not known.
pub fn percent(done: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(total) if total > 0 => Some(done as f64 / total as f64 * 100.0),
        _ => None,
    }
}

/// Pass every chunk through unchanged while tallying bytes against `total`
/// and reporting the running percentage to `indicator` after each chunk.
pub fn track<S, T, E>(
    stream: S,
    total: Option<u64>,
    indicator: Arc<dyn ProgressIndicator>,
    rounding: Rounding,
) -> impl Stream<Item = Result<T, E>>
where
    S: Stream<Item = Result<T, E>>,
    T: AsRef<[u8]>,
{
    let mut received: u64 = 0;
    stream.map(move |item| {
        if let Ok(chunk) = &item {
            received += chunk.as_ref().len() as u64;
            if let Some(p) = percent(received, total) {
                indicator.set(rounding.apply(p));
            }
        }
        item
    })
}

/// Terminal gauge drawn through a shared `MultiProgress`.
pub struct BarIndicator {
    multi: MultiProgress,
    label: String,
    bar: Mutex<Option<ProgressBar>>,
}

impl BarIndicator {
    pub fn new(multi: &MultiProgress, label: impl Into<String>) -> Self {
        Self {
            multi: multi.clone(),
            label: label.into(),
            bar: Mutex::new(None),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
        )
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl ProgressIndicator for BarIndicator {
    fn reset(&self) {
        let mut slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        let bar = slot.get_or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::new(100));
            pb.set_style(Self::style());
            pb.set_message(self.label.clone());
            pb
        });
        bar.set_position(0);
        bar.tick();
    }

    fn set(&self, percent: f64) {
        let slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = slot.as_ref() {
            bar.set_position(percent.round().clamp(0.0, 100.0) as u64);
        }
    }

    fn hide(&self) {
        let mut slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = slot.take() {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::ProgressIndicator;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        Reset,
        Set(f64),
        Hide,
    }

    #[derive(Default)]
    pub struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        pub fn values(&self) -> Vec<f64> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Set(v) => Some(v),
                    _ => None,
                })
                .collect()
        }

        pub fn hidden(&self) -> bool {
            self.events().last() == Some(&Event::Hide)
        }
    }

    impl ProgressIndicator for Recorder {
        fn reset(&self) {
            self.events.lock().unwrap().push(Event::Reset);
        }

        fn set(&self, percent: f64) {
            self.events.lock().unwrap().push(Event::Set(percent));
        }

        fn hide(&self) {
            self.events.lock().unwrap().push(Event::Hide);
        }
    }
}
