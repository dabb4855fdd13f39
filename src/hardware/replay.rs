// src/hardware/replay.rs
//
// Acquisition task that plays back recorded time series on a worker thread.
// It stands in for a DAQ device in tests and offline sessions and behaves
// like one: samples arrive in `callback_interval` chunks, the n-samples
// callback fires after every chunk and the done callback once at the end.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use log::{debug, info, warn};
use ndarray::{s, Array2, Axis};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::task::{AcquisitionTask, TaskSettings};
use super::HardwareError;
use crate::core::measurement::TimeSeries;

type SamplesCallback = Box<dyn FnMut(usize) + Send>;
type DoneCallback = Box<dyn FnMut() + Send>;
/// Handed to the worker on start and returned when it exits
type Callbacks = (Option<SamplesCallback>, Option<DoneCallback>);

/// Chunks kept in flight between worker and reader
const CHANNEL_DEPTH: usize = 16;

pub struct ReplayTask {
    settings: TaskSettings,
    signals: Arc<Array2<f64>>,
    on_samples: Option<SamplesCallback>,
    on_done: Option<DoneCallback>,
    worker: Option<JoinHandle<Callbacks>>,
    stop_tx: Option<Sender<()>>,
    data_rx: Option<Receiver<Array2<f64>>>,
    pending: Option<Array2<f64>>,
}

impl ReplayTask {
    /// Build a task from recorded channels. Every signal must be sampled at
    /// the task rate and hold at least `num_samples` values.
    pub fn new(settings: TaskSettings, signals: &[TimeSeries]) -> Result<Self, HardwareError> {
        if signals.is_empty() {
            return Err(HardwareError::NoChannels);
        }
        let n = settings.num_samples();
        let mut data = Array2::zeros((signals.len(), n));
        for (mut row, ts) in data.axis_iter_mut(Axis(0)).zip(signals) {
            if ts.fs != settings.sampling_freq {
                return Err(HardwareError::Backend(format!(
                    "{} is sampled at {} Hz, task runs at {} Hz",
                    ts.name, ts.fs, settings.sampling_freq
                )));
            }
            if ts.len() < n {
                return Err(HardwareError::Exhausted {
                    requested: n,
                    available: ts.len(),
                });
            }
            row.assign(&ndarray::ArrayView1::from(&ts.data[..n]));
        }

        Ok(Self {
            settings,
            signals: Arc::new(data),
            on_samples: None,
            on_done: None,
            worker: None,
            stop_tx: None,
            data_rx: None,
            pending: None,
        })
    }

    pub fn with_callbacks<F, D>(mut self, on_samples: F, on_done: D) -> Self
    where
        F: FnMut(usize) + Send + 'static,
        D: FnMut() + Send + 'static,
    {
        self.on_samples = Some(Box::new(on_samples));
        self.on_done = Some(Box::new(on_done));
        self
    }

    pub fn num_channels(&self) -> usize {
        self.signals.nrows()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map_or(false, |w| !w.is_finished())
    }

    /// Read everything the task produces
    pub fn read_all(&mut self) -> Result<Array2<f64>, HardwareError> {
        self.read(self.settings.num_samples())
    }

    fn buffered(&self) -> usize {
        self.pending.as_ref().map_or(0, |p| p.ncols())
    }

    fn append(&mut self, chunk: Array2<f64>) -> Result<(), HardwareError> {
        self.pending = Some(match self.pending.take() {
            None => chunk,
            Some(prev) => ndarray::concatenate(Axis(1), &[prev.view(), chunk.view()])
                .map_err(|e| HardwareError::Backend(e.to_string()))?,
        });
        Ok(())
    }
}

fn replay_worker(
    signals: Arc<Array2<f64>>,
    chunk: usize,
    data_tx: Sender<Array2<f64>>,
    stop_rx: Receiver<()>,
    mut on_samples: Option<SamplesCallback>,
    mut on_done: Option<DoneCallback>,
) -> Callbacks {
    let total = signals.ncols();
    let mut pos = 0;

    while pos < total {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                debug!("Replay stopped at sample {}", pos);
                return (on_samples, on_done);
            }
            Err(TryRecvError::Empty) => {}
        }

        let end = (pos + chunk).min(total);
        let block = signals.slice(s![.., pos..end]).to_owned();
        if data_tx.send(block).is_err() {
            debug!("Replay reader went away at sample {}", pos);
            return (on_samples, on_done);
        }
        if let Some(cb) = on_samples.as_mut() {
            cb(end - pos);
        }
        pos = end;
    }

    if let Some(cb) = on_done.as_mut() {
        cb();
    }
    (on_samples, on_done)
}

impl AcquisitionTask for ReplayTask {
    fn settings(&self) -> &TaskSettings {
        &self.settings
    }

    fn start(&mut self) -> Result<(), HardwareError> {
        if self.worker.is_some() {
            return Err(HardwareError::AlreadyRunning(self.settings.name.clone()));
        }
        let (data_tx, data_rx) = bounded(CHANNEL_DEPTH);
        let (stop_tx, stop_rx) = bounded(1);
        let signals = Arc::clone(&self.signals);
        let chunk = self.settings.callback_interval().max(1);
        let on_samples = self.on_samples.take();
        let on_done = self.on_done.take();

        info!(
            "Starting task '{}': {} channels, {} samples at {} Hz",
            self.settings.name,
            self.num_channels(),
            self.settings.num_samples(),
            self.settings.sampling_freq
        );
        self.worker = Some(std::thread::spawn(move || {
            replay_worker(signals, chunk, data_tx, stop_rx, on_samples, on_done)
        }));
        self.stop_tx = Some(stop_tx);
        self.data_rx = Some(data_rx);
        self.pending = None;
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Array2<f64>, HardwareError> {
        while self.buffered() < n {
            let rx = self
                .data_rx
                .as_ref()
                .ok_or_else(|| HardwareError::NotRunning(self.settings.name.clone()))?;
            match rx.recv() {
                Ok(chunk) => self.append(chunk)?,
                Err(_) => {
                    return Err(HardwareError::Exhausted {
                        requested: n,
                        available: self.buffered(),
                    })
                }
            }
        }

        let rows = self.num_channels();
        let pending = self.pending.take().unwrap_or_else(|| Array2::zeros((rows, 0)));
        let out = pending.slice(s![.., ..n]).to_owned();
        if pending.ncols() > n {
            self.pending = Some(pending.slice(s![.., n..]).to_owned());
        }
        Ok(out)
    }

    fn stop(&mut self) -> Result<(), HardwareError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        // unblocks a worker waiting on a full channel
        self.data_rx = None;
        self.pending = None;
        if let Some(worker) = self.worker.take() {
            let (on_samples, on_done) = worker
                .join()
                .map_err(|_| HardwareError::Backend("replay worker panicked".into()))?;
            self.on_samples = on_samples;
            self.on_done = on_done;
            debug!("Task '{}' stopped", self.settings.name);
        }
        Ok(())
    }
}

impl Drop for ReplayTask {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop task '{}': {}", self.settings.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::measurement::Direction;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn ramp(name: &str, n: usize, fs: u32, offset: f64) -> TimeSeries {
        let data = (0..n).map(|i| offset + i as f64).collect();
        TimeSeries::new(data, "V", fs, "Voltage", name, Direction::PlusZ)
    }

    #[test]
    fn test_replay_in_callback_chunks() {
        let settings = TaskSettings::new("replay", 2.0, 5000);
        let signals = vec![ramp("a", 10000, 5000, 0.0), ramp("b", 10000, 5000, 0.5)];

        let counted = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicBool::new(false));
        let (c, k, d) = (counted.clone(), calls.clone(), done.clone());

        let mut task = ReplayTask::new(settings, &signals).unwrap().with_callbacks(
            move |n| {
                c.fetch_add(n, Ordering::SeqCst);
                k.fetch_add(1, Ordering::SeqCst);
            },
            move || d.store(true, Ordering::SeqCst),
        );
        task.start().unwrap();
        let first = task.read(3000).unwrap();
        let rest = task.read(7000).unwrap();
        task.stop().unwrap();

        assert_eq!(first.dim(), (2, 3000));
        assert_eq!(first[[1, 0]], 0.5);
        assert_eq!(rest[[0, 0]], 3000.0);
        assert_eq!(rest[[1, 6999]], 9999.5);
        assert_eq!(counted.load(Ordering::SeqCst), 10000);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn test_restart_keeps_callbacks() {
        let settings = TaskSettings::new("again", 2.0, 5000);
        let calls = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));
        let (k, r) = (calls.clone(), runs.clone());

        let mut task = ReplayTask::new(settings, &[ramp("a", 10000, 5000, 0.0)])
            .unwrap()
            .with_callbacks(
                move |_| {
                    k.fetch_add(1, Ordering::SeqCst);
                },
                move || {
                    r.fetch_add(1, Ordering::SeqCst);
                },
            );
        for _ in 0..2 {
            task.start().unwrap();
            assert_eq!(task.read_all().unwrap().ncols(), 10000);
            task.stop().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_read_past_end() {
        let settings = TaskSettings::new("short", 1.0, 100);
        let mut task = ReplayTask::new(settings, &[ramp("a", 100, 100, 0.0)]).unwrap();
        task.start().unwrap();
        let err = task.read(150).unwrap_err();
        assert!(matches!(err, HardwareError::Exhausted { available: 100, .. }));
    }

    #[test]
    fn test_read_before_start_and_double_start() {
        let settings = TaskSettings::new("idle", 1.0, 100);
        let mut task = ReplayTask::new(settings, &[ramp("a", 100, 100, 0.0)]).unwrap();
        assert!(matches!(task.read(10), Err(HardwareError::NotRunning(_))));
        task.start().unwrap();
        assert!(matches!(task.start(), Err(HardwareError::AlreadyRunning(_))));
    }

    #[test]
    fn test_stop_while_streaming() {
        // more chunks than the channel holds, nobody reads
        let settings = TaskSettings::new("long", 100.0, 1000);
        let mut task = ReplayTask::new(settings, &[ramp("a", 100_000, 1000, 0.0)]).unwrap();
        task.start().unwrap();
        task.stop().unwrap();
        assert!(!task.is_running());
    }

    #[test]
    fn test_rejects_mismatched_rate_and_short_signal() {
        let settings = TaskSettings::new("bad", 1.0, 100);
        assert!(matches!(
            ReplayTask::new(settings.clone(), &[ramp("a", 100, 200, 0.0)]),
            Err(HardwareError::Backend(_))
        ));
        assert!(matches!(
            ReplayTask::new(settings.clone(), &[ramp("a", 50, 100, 0.0)]),
            Err(HardwareError::Exhausted { .. })
        ));
        assert!(matches!(ReplayTask::new(settings, &[]), Err(HardwareError::NoChannels)));
    }
}
