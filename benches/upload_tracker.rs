//! Benchmarks for the upload tracker and dashboard merge
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use volt_tui::model::file_record::{FileRecord, StorageStats};
use volt_tui::model::transfer_event::{TransferEvent, UploadReply};
use volt_tui::model::upload_item::UploadId;
use volt_tui::services::batch_debouncer::{Clock, DebounceTimings, ManualClock};
use volt_tui::services::dashboard::Dashboard;
use volt_tui::services::upload_tracker::UploadTracker;

fn create_records(count: usize, offset: u64) -> Vec<FileRecord> {
    (0..count)
        .map(|i| FileRecord {
            id: offset + i as u64,
            display_name: format!("file-{}.txt", i),
            ..FileRecord::default()
        })
        .collect()
}

fn finish_reply(id: u64) -> UploadReply {
    UploadReply::new(
        201,
        format!(
            r#"{{"success": true, "files": [{{"file_reference": {{"id": {}, "display_name": "file-{}.txt"}}}}], "storage_stats": {{"total_files": {}}}}}"#,
            id, id, id
        ),
    )
}

/// Start, ten progress steps and finish for every upload, then flush once
fn bench_full_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("upload_tracker");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("full_batch", size), size, |b, &size| {
            b.iter(|| {
                let clock = ManualClock::new();
                let mut tracker = UploadTracker::new(DebounceTimings::default());
                let ids: Vec<UploadId> = (0..size).map(|_| UploadId::generate()).collect();
                for (n, id) in ids.iter().enumerate() {
                    tracker.handle(
                        TransferEvent::Started {
                            id: *id,
                            file_name: format!("file-{}.txt", n),
                        },
                        clock.now(),
                    );
                }
                for step in 1..=10 {
                    for id in &ids {
                        tracker.handle(
                            TransferEvent::Progress {
                                id: *id,
                                completed: f64::from(step) * 10.0,
                            },
                            clock.now(),
                        );
                    }
                }
                for (n, id) in ids.iter().enumerate() {
                    tracker.handle(
                        TransferEvent::Finished {
                            id: *id,
                            reply: finish_reply(n as u64),
                        },
                        clock.now(),
                    );
                }
                clock.advance(Duration::from_millis(500));
                black_box(tracker.poll(clock.now()))
            });
        });

        group.bench_with_input(BenchmarkId::new("progress_items", size), size, |b, &size| {
            let clock = ManualClock::new();
            let mut tracker = UploadTracker::new(DebounceTimings::default());
            for n in 0..size {
                let id = UploadId::generate();
                tracker.handle(
                    TransferEvent::Started {
                        id,
                        file_name: format!("file-{}.txt", n),
                    },
                    clock.now(),
                );
                tracker.handle(
                    TransferEvent::Progress {
                        id,
                        completed: (n % 100) as f64,
                    },
                    clock.now(),
                );
            }

            b.iter(|| black_box(tracker.progress_items()));
        });
    }

    group.finish();
}

fn bench_dashboard_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("dashboard_merge");

    for existing in [100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("merge_upload_batch", existing),
            existing,
            |b, &existing| {
                let rows = create_records(existing, 0);
                // half of the batch replaces existing rows
                let batch = create_records(50, existing as u64 - 25);

                b.iter(|| {
                    let mut dashboard = Dashboard::new();
                    dashboard.apply_files(Ok(rows.clone()));
                    dashboard.merge_upload_batch(black_box(batch.clone()), StorageStats::default());
                    black_box(dashboard.files().len())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_full_batch, bench_dashboard_merge);
criterion_main!(benches);
