//! Demo commands: push the slow doubling calculation through the ordered mapper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use ordmap_core::{
    map_sequential, Completion, Config, FailurePolicy, OrderedMapper, SlowCalculation,
};
use serde_json::json;

/// Inputs used when none are given on the command line.
pub fn default_values() -> Vec<i64> {
    (0..10).collect()
}

pub struct DemoOptions {
    pub values: Vec<i64>,
    pub config: Config,
    /// Draw a progress bar while tasks run.
    pub progress: bool,
}

pub struct RunReport {
    pub input: Vec<i64>,
    /// `None` where the calculation failed (collect-all only).
    pub output: Vec<Option<i64>>,
    pub failures: Vec<(usize, String)>,
    pub elapsed: Duration,
    pub workers: usize,
    pub policy: FailurePolicy,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "command": "run",
            "policy": self.policy,
            "workers": self.workers,
            "elapsedMs": self.elapsed.as_millis() as u64,
            "input": self.input,
            "output": self.output,
            "failures": self
                .failures
                .iter()
                .map(|(index, error)| json!({ "index": index, "error": error }))
                .collect::<Vec<_>>(),
        })
    }
}

pub struct CompareReport {
    pub input: Vec<i64>,
    pub output: Vec<i64>,
    pub sequential: Duration,
    pub concurrent: Duration,
    pub workers: usize,
}

impl CompareReport {
    pub fn speedup(&self) -> f64 {
        let concurrent = self.concurrent.as_secs_f64();
        if concurrent <= f64::EPSILON {
            return 0.0;
        }
        self.sequential.as_secs_f64() / concurrent
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "command": "compare",
            "workers": self.workers,
            "input": self.input,
            "output": self.output,
            "sequentialMs": self.sequential.as_millis() as u64,
            "concurrentMs": self.concurrent.as_millis() as u64,
            "speedup": self.speedup(),
        })
    }
}

/// Run with a progress bar fed from `completion` until `work` returns.
fn with_progress<T, W>(total: usize, completion: &Completion, show: bool, work: W) -> T
where
    W: FnOnce() -> T,
{
    if !show || total == 0 {
        return work();
    }
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.dim} [{bar:30.cyan/blue}] {pos}/{len} tasks {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    let done = AtomicBool::new(false);
    let result = thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Acquire) {
                bar.set_position(completion.finished() as u64);
                thread::sleep(Duration::from_millis(50));
            }
        });
        let result = work();
        done.store(true, Ordering::Release);
        result
    });
    bar.finish_and_clear();
    result
}

/// Concurrent run honoring the configured failure policy.
pub fn run_concurrent(opts: &DemoOptions) -> Result<RunReport, String> {
    let mapper_config = opts.config.mapper_config();
    let policy = mapper_config.failure_policy;
    let workers = mapper_config.workers_for(opts.values.len());
    let calc = SlowCalculation::new(opts.config.delay());
    let completion = Completion::new();
    let mapper = OrderedMapper::new(mapper_config).with_completion(completion.clone());

    tracing::info!(
        tasks = opts.values.len(),
        workers,
        ?policy,
        delay_min_ms = calc.delay.min,
        delay_max_ms = calc.delay.max,
        "starting concurrent run"
    );

    let started = Instant::now();
    let values = opts.values.clone();
    let partial = with_progress(values.len(), &completion, opts.progress, || {
        mapper.run_with_policy(values, |x| calc.try_double(x))
    })
    .map_err(|e| e.to_string())?;
    let failures = partial
        .failures
        .iter()
        .map(|f| (f.index(), f.to_string()))
        .collect::<Vec<_>>();
    let output = partial.slots;

    Ok(RunReport {
        input: opts.values.clone(),
        output,
        failures,
        elapsed: started.elapsed(),
        workers,
        policy,
    })
}

/// Sequential baseline against the concurrent mapper on the same inputs.
pub fn compare(opts: &DemoOptions) -> Result<CompareReport, String> {
    let mapper_config = opts.config.mapper_config();
    let workers = mapper_config.workers_for(opts.values.len());
    let calc = SlowCalculation::new(opts.config.delay());

    let started = Instant::now();
    let expected = map_sequential(opts.values.clone(), |x| calc.double(x));
    let sequential = started.elapsed();

    let completion = Completion::new();
    let mapper = OrderedMapper::new(mapper_config).with_completion(completion.clone());
    let started = Instant::now();
    let output = with_progress(opts.values.len(), &completion, opts.progress, || {
        mapper.run(opts.values.clone(), |x| calc.double(x))
    })
    .map_err(|e| e.to_string())?;
    let concurrent = started.elapsed();

    if output != expected {
        return Err(format!(
            "Concurrent output {:?} does not match sequential output {:?}.",
            output, expected
        ));
    }

    tracing::info!(
        sequential_ms = sequential.as_millis() as u64,
        concurrent_ms = concurrent.as_millis() as u64,
        "compare finished"
    );

    Ok(CompareReport {
        input: opts.values.clone(),
        output,
        sequential,
        concurrent,
        workers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordmap_core::DelayRange;

    fn opts(values: Vec<i64>, policy: FailurePolicy) -> DemoOptions {
        DemoOptions {
            values,
            config: Config {
                max_workers: None,
                failure_policy: Some(policy),
                delay_ms: Some(DelayRange::fixed(1)),
            },
            progress: false,
        }
    }

    #[test]
    fn test_run_concurrent_default_values() {
        let report = run_concurrent(&opts(default_values(), FailurePolicy::FailFast)).unwrap();
        let expected: Vec<Option<i64>> = (0..10).map(|x| Some(x * 2)).collect();
        assert_eq!(report.output, expected);
        assert!(report.failures.is_empty());
        assert_eq!(report.workers, 10);
    }

    #[test]
    fn test_run_concurrent_fail_fast_errors() {
        let result = run_concurrent(&opts(vec![1, i64::MAX], FailurePolicy::FailFast));
        let err = result.err().unwrap();
        assert!(err.contains("index 1"));
    }

    #[test]
    fn test_run_concurrent_collect_all_reports() {
        let report =
            run_concurrent(&opts(vec![1, i64::MAX, 3], FailurePolicy::CollectAll)).unwrap();
        assert_eq!(report.output, vec![Some(2), None, Some(6)]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, 1);

        let value = report.to_json();
        assert_eq!(value["policy"], "collect-all");
        assert_eq!(value["failures"][0]["index"], 1);
        assert!(value["output"][1].is_null());
    }

    #[test]
    fn test_compare_matches() {
        let report = compare(&opts(vec![4, 5, 6], FailurePolicy::FailFast)).unwrap();
        assert_eq!(report.output, vec![8, 10, 12]);
        assert_eq!(report.to_json()["command"], "compare");
    }
}
