// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic cache-allotment usage example.
//!
//! Demonstrates:
//! 1. Building a tree from the stream-info preset plus a chunk cache
//! 2. Starting the manager and its resize loop
//! 3. Simulated memory pressure: shrink deferred until a collection
//! 4. Displaying per-cache stats and metrics
//! 5. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cache_allotment::presets::stream_info_dynamic;
use cache_allotment::probe::FnProbe;
use cache_allotment::{Allotment, AllotmentConfig, CacheManager, StatsReport, Unit};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

const GB: u64 = 1_000_000_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           cache-allotment: Basic Usage Example                ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Build the tree
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Building cache tree...");
    let total_memory = 16 * GB;
    let stream_info = stream_info_dynamic::<String, i64, String>(
        total_memory,
        |stream| stream.capacity() as u64,
        |metadata| metadata.capacity() as u64,
    )?;

    let config = AllotmentConfig {
        keep_free_bytes: 2 * GB,
        total_memory_bytes: Some(total_memory),
        monitoring_interval_ms: 50,
        ..Default::default()
    };
    let chunks = Arc::new(config.sized_lru::<u64, Vec<u8>>("Chunks", |_, chunk| chunk.len() as u64));

    let tree = Allotment::composite(
        "cache",
        100,
        vec![
            stream_info.allotment,
            Allotment::dynamic("Chunks", Unit::Bytes, 50, 64 * 1024 * 1024, chunks.clone())?,
        ],
    )?;

    // Simulated host: free memory and collection count are ours to turn
    let free = Arc::new(AtomicU64::new(8 * GB));
    let collections = Arc::new(AtomicU64::new(0));
    let probe = {
        let free = free.clone();
        let collections = collections.clone();
        FnProbe::new(total_memory, move || free.load(Ordering::SeqCst))
            .with_full_collections(move || collections.load(Ordering::SeqCst))
    };
    let manager = Arc::new(CacheManager::new(&config, tree, Arc::new(probe))?);
    println!("   State: {}", manager.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Start
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🚀 Starting manager...");
    manager.start()?;
    let handle = manager.spawn();
    stream_info.last_event_number.put("$stats-node".to_string(), 42);
    stream_info.metadata.put("orders".to_string(), "{\"$maxCount\":1000}".to_string());
    for i in 0..64 {
        chunks.put(i, vec![0; 1024 * 1024]);
    }
    print_stats(&manager.stats());

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Memory pressure
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📉 Free memory drops to 3 GB (no collection yet)...");
    free.store(3 * GB, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    print_stats(&manager.stats());

    println!("\n♻️  A full collection completes...");
    collections.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    print_stats(&manager.stats());

    println!("\n📈 Free memory recovers to 10 GB (growth is relaxed per tick)...");
    free.store(10 * GB, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    print_stats(&manager.stats());

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Raw Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Shutting down...");
    manager.shutdown();
    handle.await?;
    println!("   ✅ Shutdown complete! State: {} after {} passes", manager.state(), manager.ticks());

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

fn print_stats(report: &StatsReport) {
    println!(
        "   ┌─ Pass {} (raw pool {:.2} GB)",
        report.tick,
        report.raw_pool.unwrap_or(0) as f64 / GB as f64
    );
    for row in &report.rows {
        println!(
            "   │  └─ {:<40} {:>10.3} GB  size {:>12}  {:>5.1}%",
            row.key,
            row.capacity as f64 / GB as f64,
            row.size,
            row.utilization_percent
        );
    }
}

/// Dump all captured metrics, sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let labels = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let value = match value {
            DebugValue::Counter(v) => v.to_string(),
            DebugValue::Gauge(v) => format!("{:.0}", v.into_inner()),
            DebugValue::Histogram(samples) => format!("{} samples", samples.len()),
        };
        lines.push(format!("{}{} = {}", key.name(), labels, value));
    }
    lines.sort();
    for line in lines {
        println!("   └─ {line}");
    }
}
