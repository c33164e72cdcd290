use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use slotbuffer::buffer::{Buffer, BufferStats};
use slotbuffer::evictor::{LruEvictor, RandomEvictor};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Standalone benchmark runner for eviction strategy analysis.
///
/// Pass `--json` to print the raw metrics as JSON instead of the report.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let json = std::env::args().any(|a| a == "--json");

    let benchmark = EvictionBenchmark::new();
    let results = benchmark.run_benchmark_suite(!json);

    if json {
        match serde_json::to_string_pretty(&results) {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("failed to encode results: {e}"),
        }
    } else {
        println!("{}", EvictionBenchmark::generate_report(&results));
    }
}

/// Benchmark configuration for eviction strategy analysis
#[derive(Clone)]
pub struct BenchmarkConfig {
    pub name: &'static str,
    pub buffer_slots: usize,
    pub total_items: usize,
    // byte budget; items then vary in size
    pub byte_budget: Option<usize>,
    pub access_pattern: AccessPattern,
    pub workload_type: WorkloadType,
}

#[derive(Clone)]
pub enum AccessPattern {
    Sequential,
    Random(Vec<u64>),
    Working(Vec<u64>), // Simulates working set locality
    LruWorst,          // Pattern designed to defeat LRU-like strategies
}

#[derive(Clone)]
pub enum WorkloadType {
    ReadOnly,
    WriteHeavy(f64), // Percentage of write operations
    Mixed(f64, f64), // (read_pct, write_pct)
}

#[derive(Clone, Copy, Debug)]
pub enum Strategy {
    Lru,
    Random,
}

impl Strategy {
    fn name(self) -> &'static str {
        match self {
            Strategy::Lru => "lru",
            Strategy::Random => "random",
        }
    }

    fn build(self, config: &BenchmarkConfig) -> Buffer<u8, u64, Vec<u8>> {
        match (self, config.byte_budget) {
            (Strategy::Lru, None) => Buffer::new(config.buffer_slots, LruEvictor::new()),
            (Strategy::Lru, Some(bytes)) => {
                Buffer::with_byte_capacity(config.buffer_slots, bytes, LruEvictor::new())
            }
            (Strategy::Random, None) => {
                Buffer::new(config.buffer_slots, RandomEvictor::seeded(7))
            }
            (Strategy::Random, Some(bytes)) => {
                Buffer::with_byte_capacity(config.buffer_slots, bytes, RandomEvictor::seeded(7))
            }
        }
    }
}

/// Performance metrics collected during benchmarking
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub strategy_name: String,
    pub config_name: String,
    pub buffer_slots: usize,
    pub total_items: usize,
    pub total_operations: usize,
    pub stats: BufferStats,
    pub write_backs: u64,
    pub overflows: u64,
    pub elapsed_nanos: u128,
}

impl PerformanceMetrics {
    pub fn hit_rate(&self) -> f64 {
        self.stats.hit_rate()
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }

    pub fn operations_per_second(&self) -> f64 {
        if self.elapsed_nanos == 0 {
            0.0
        } else {
            (self.total_operations as f64) / (self.elapsed_nanos as f64 / 1_000_000_000.0)
        }
    }

    pub fn avg_latency_nanos(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            self.elapsed_nanos as f64 / self.total_operations as f64
        }
    }

    pub fn evictions_per_1k_ops(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            (self.stats.evictions as f64 / self.total_operations as f64) * 1000.0
        }
    }
}

/// Benchmark runner for eviction strategies
pub struct EvictionBenchmark {
    strategies: Vec<Strategy>,
    configs: Vec<BenchmarkConfig>,
}

impl Default for EvictionBenchmark {
    fn default() -> Self {
        Self::new()
    }
}

fn random_pattern(seed: u64, len: usize, items: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(0..items)).collect()
}

impl EvictionBenchmark {
    pub fn new() -> Self {
        Self {
            strategies: vec![Strategy::Lru, Strategy::Random],
            configs: Self::create_benchmark_configs(),
        }
    }

    fn create_benchmark_configs() -> Vec<BenchmarkConfig> {
        vec![
            BenchmarkConfig {
                name: "small_buffer_sequential",
                buffer_slots: 3,
                total_items: 50,
                byte_budget: None,
                access_pattern: AccessPattern::Sequential,
                workload_type: WorkloadType::ReadOnly,
            },
            BenchmarkConfig {
                name: "small_buffer_random",
                buffer_slots: 3,
                total_items: 50,
                byte_budget: None,
                access_pattern: AccessPattern::Random(random_pattern(42, 200, 50)),
                workload_type: WorkloadType::ReadOnly,
            },
            BenchmarkConfig {
                name: "working_set_locality",
                buffer_slots: 5,
                total_items: 25,
                byte_budget: None,
                access_pattern: AccessPattern::Working(Self::generate_working_set_pattern(
                    25, 5, 200,
                )),
                workload_type: WorkloadType::ReadOnly,
            },
            BenchmarkConfig {
                name: "mixed_workload",
                buffer_slots: 8,
                total_items: 100,
                byte_budget: None,
                access_pattern: AccessPattern::Random(random_pattern(123, 300, 100)),
                workload_type: WorkloadType::Mixed(0.7, 0.3),
            },
            BenchmarkConfig {
                name: "medium_buffer_write_heavy",
                buffer_slots: 16,
                total_items: 200,
                byte_budget: None,
                access_pattern: AccessPattern::Random(random_pattern(456, 500, 200)),
                workload_type: WorkloadType::WriteHeavy(0.4),
            },
            BenchmarkConfig {
                name: "large_dataset_scan",
                buffer_slots: 32,
                total_items: 1000,
                byte_budget: None,
                access_pattern: AccessPattern::Sequential,
                workload_type: WorkloadType::ReadOnly,
            },
            BenchmarkConfig {
                name: "lru_worst_case",
                buffer_slots: 4,
                total_items: 10,
                byte_budget: None,
                access_pattern: AccessPattern::LruWorst,
                workload_type: WorkloadType::ReadOnly,
            },
            BenchmarkConfig {
                name: "byte_budget_variable_items",
                buffer_slots: 64,
                total_items: 200,
                byte_budget: Some(16 * 1024),
                access_pattern: AccessPattern::Working(Self::generate_working_set_pattern(
                    200, 20, 1000,
                )),
                workload_type: WorkloadType::Mixed(0.8, 0.2),
            },
            BenchmarkConfig {
                name: "extreme_pressure",
                buffer_slots: 1,
                total_items: 50,
                byte_budget: None,
                access_pattern: AccessPattern::Random(random_pattern(999, 200, 50)),
                workload_type: WorkloadType::ReadOnly,
            },
        ]
    }

    /// Generate access pattern that simulates working set locality
    fn generate_working_set_pattern(
        total_items: usize,
        working_set_size: usize,
        num_accesses: usize,
    ) -> Vec<u64> {
        let mut rng = StdRng::seed_from_u64(42);
        (0..num_accesses)
            .map(|_| {
                // 80% chance to access working set, 20% chance to access other items
                if rng.gen_bool(0.8) {
                    rng.gen_range(0..working_set_size as u64)
                } else {
                    rng.gen_range(working_set_size as u64..total_items as u64)
                }
            })
            .collect()
    }

    /// Generate access sequence based on the access pattern
    fn generate_access_sequence(config: &BenchmarkConfig) -> Vec<u64> {
        match &config.access_pattern {
            AccessPattern::Sequential => (0..config.total_items)
                .cycle()
                .take(config.total_items * 2)
                .map(|i| i as u64)
                .collect(),
            AccessPattern::Random(pattern) | AccessPattern::Working(pattern) => pattern.clone(),
            AccessPattern::LruWorst => {
                // cycling over one item more than fits defeats LRU
                (0..100)
                    .flat_map(|_| 0..=config.buffer_slots as u64)
                    .collect()
            }
        }
    }

    // item sizes vary only under a byte budget
    fn item(config: &BenchmarkConfig, id: u64) -> Vec<u8> {
        let len = match config.byte_budget {
            Some(_) => 64 + (id as usize * 37) % 960,
            None => 64,
        };
        vec![id as u8; len]
    }

    /// Run benchmark for a specific strategy and configuration
    pub fn run_single_benchmark(
        &self,
        strategy: Strategy,
        config: &BenchmarkConfig,
    ) -> PerformanceMetrics {
        let mut buffer = strategy.build(config);
        let access_sequence = Self::generate_access_sequence(config);
        let write_backs = Arc::new(AtomicU64::new(0));
        let mut overflows = 0;
        let mut rng = StdRng::seed_from_u64(42);

        let start_time = Instant::now();
        for &idx in &access_sequence {
            let write = match config.workload_type {
                WorkloadType::ReadOnly => false,
                WorkloadType::WriteHeavy(ratio) => rng.gen_bool(ratio),
                WorkloadType::Mixed(read, write) => {
                    let op = rng.gen_range(0.0..1.0);
                    if op >= read + write {
                        // Remaining percentage is no-op (simulates other system activity)
                        continue;
                    }
                    op >= read
                }
            };
            let result = if write {
                let counter = Arc::clone(&write_backs);
                buffer.update_with(
                    &0,
                    &idx,
                    |id| Ok(Self::item(config, *id)),
                    move |_, _| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    },
                    true,
                    |data| data[0] = data[0].wrapping_add(1),
                )
            } else {
                buffer
                    .get(&0, &idx, |id| Ok(Self::item(config, *id)), true)
                    .map(|_| ())
            };
            if result.is_err() {
                overflows += 1;
            }
        }
        let elapsed = start_time.elapsed();

        PerformanceMetrics {
            strategy_name: strategy.name().to_string(),
            config_name: config.name.to_string(),
            buffer_slots: config.buffer_slots,
            total_items: config.total_items,
            total_operations: access_sequence.len(),
            stats: buffer.stats(),
            write_backs: write_backs.load(Ordering::Relaxed),
            overflows,
            elapsed_nanos: elapsed.as_nanos(),
        }
    }

    /// Run comprehensive benchmark suite
    pub fn run_benchmark_suite(&self, verbose: bool) -> Vec<PerformanceMetrics> {
        let mut results = Vec::new();

        for (config_idx, config) in self.configs.iter().enumerate() {
            if verbose {
                eprintln!(
                    "Running config {}/{}: {}",
                    config_idx + 1,
                    self.configs.len(),
                    config.name
                );
            }
            for &strategy in &self.strategies {
                let metrics = self.run_single_benchmark(strategy, config);
                if verbose {
                    eprintln!(
                        "  {:<8} hit rate {:.1}%, {:.0} ops/sec",
                        strategy.name(),
                        metrics.hit_rate() * 100.0,
                        metrics.operations_per_second()
                    );
                }
                results.push(metrics);
            }
        }

        results
    }

    /// Generate detailed performance report
    pub fn generate_report(results: &[PerformanceMetrics]) -> String {
        let mut report = String::new();
        report.push_str("# Eviction Strategy Performance Analysis\n\n");

        // Group results by configuration, in run order
        let mut config_names: Vec<&str> = Vec::new();
        let mut by_config: HashMap<&str, Vec<&PerformanceMetrics>> = HashMap::new();
        for result in results {
            let name = result.config_name.as_str();
            if !by_config.contains_key(name) {
                config_names.push(name);
            }
            by_config.entry(name).or_default().push(result);
        }

        for config_name in config_names {
            let config_results = &by_config[config_name];
            let first_result = config_results[0];

            report.push_str(&format!("## {config_name}\n"));
            report.push_str(&format!("- Buffer slots: {}\n", first_result.buffer_slots));
            report.push_str(&format!("- Total items: {}\n", first_result.total_items));
            report.push_str(&format!(
                "- Operations: {}\n\n",
                first_result.total_operations
            ));

            report.push_str("| Strategy | Hit Rate | Miss Rate | Ops/sec | Avg Latency (ns) | Evictions/1k ops | Write-backs | Overflows |\n");
            report.push_str("|----------|----------|-----------|---------|------------------|------------------|-------------|-----------|\n");

            for result in config_results {
                report.push_str(&format!(
                    "| {} | {:.1}% | {:.1}% | {:.0} | {:.1} | {:.1} | {} | {} |\n",
                    result.strategy_name,
                    result.hit_rate() * 100.0,
                    result.miss_rate() * 100.0,
                    result.operations_per_second(),
                    result.avg_latency_nanos(),
                    result.evictions_per_1k_ops(),
                    result.write_backs,
                    result.overflows,
                ));
            }
            report.push('\n');
        }

        report.push_str("## Average Performance by Strategy\n\n");
        report.push_str("| Strategy | Avg Hit Rate | Avg Ops/sec |\n");
        report.push_str("|----------|--------------|-------------|\n");

        let mut strategy_totals: Vec<(&str, f64, f64, usize)> = Vec::new();
        for result in results {
            let name = result.strategy_name.as_str();
            let pos = match strategy_totals.iter().position(|t| t.0 == name) {
                Some(pos) => pos,
                None => {
                    strategy_totals.push((name, 0.0, 0.0, 0));
                    strategy_totals.len() - 1
                }
            };
            let entry = &mut strategy_totals[pos];
            entry.1 += result.hit_rate();
            entry.2 += result.operations_per_second();
            entry.3 += 1;
        }
        for (strategy, hit_rate_sum, ops_sum, count) in strategy_totals {
            report.push_str(&format!(
                "| {} | {:.1}% | {:.0} |\n",
                strategy,
                (hit_rate_sum / count as f64) * 100.0,
                ops_sum / count as f64
            ));
        }

        report
    }
}
