use pdfmill::engine::{GpuReport, SmokeTest};
use pdfmill::report::{Outcome, RunSummary};

#[test]
fn summary_lists_rate_and_failures() {
    let mut s = RunSummary::new();
    s.enter_dir("");
    s.record("", Outcome::Processed { image_failures: 1 });
    s.record("", Outcome::Skipped);
    s.enter_dir("a");
    s.record("a", Outcome::Failed);
    s.record("a", Outcome::Skipped);
    s.finish();

    let out = s.to_string();
    assert!(out.contains("Directories processed: 2"));
    assert!(out.contains("Total PDF files: 4"));
    assert!(out.contains("Successfully processed: 3"));
    assert!(out.contains("Failed: 1"));
    assert!(out.contains("Image write failures: 1"));
    assert!(out.contains("Processing rate: 3/4 (75.0%)"));
    assert!(s.finished.is_some());
}

#[test]
fn empty_run_has_no_rate() {
    let s = RunSummary::new();
    assert_eq!(s.completion_rate(), None);
    assert!(!s.to_string().contains("Processing rate"));
}

fn gpu(cuda: bool) -> GpuReport {
    GpuReport {
        torch_version: "2.3.0".into(),
        cuda_available: cuda,
        cuda_version: cuda.then(|| "12.1".to_string()),
        device_count: u32::from(cuda),
        current_device: cuda.then_some(0),
        device_name: cuda.then(|| "Test GPU".to_string()),
        tensor_test: SmokeTest { ok: true, error: None },
        gpu_test: cuda.then_some(SmokeTest {
            ok: false,
            error: Some("oom".into()),
        }),
    }
}

#[test]
fn gpu_report_recommends_by_availability() {
    let with = gpu(true).to_string();
    assert!(with.contains("Device name: Test GPU"));
    assert!(with.contains("GPU functionality test failed: oom"));
    assert!(with.contains("Use GPU-accelerated scripts"));

    let without = gpu(false).to_string();
    assert!(without.contains("CUDA version: N/A"));
    assert!(without.contains("No CUDA GPU available. Using CPU."));
    assert!(without.contains("Use CPU-only scripts"));
}
