mod common;

use pdfmill::inspect::{ImageKind, count_images, inspect_pdf};

#[test]
fn counts_images_per_page() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = tmp.path().join("doc.pdf");
    common::write_pdf(&pdf, &[2, 0, 1]);

    let report = inspect_pdf(&pdf).unwrap();
    assert_eq!(report.page_count, 3);
    assert_eq!(report.raster_images, 3);
    assert_eq!(report.vector_images, 0);
    let pages: Vec<u32> = report.pages.iter().map(|p| p.page).collect();
    assert_eq!(pages, vec![1, 3]);
    let first = &report.pages[0].images[0];
    assert_eq!((first.width, first.height), (2, 2));
    assert_eq!(first.kind, ImageKind::Raster);
    assert_eq!(count_images(&pdf).unwrap(), 3);
}

#[test]
fn text_only_pdf_has_no_images() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = tmp.path().join("plain.pdf");
    common::write_pdf(&pdf, &[0, 0]);
    let report = inspect_pdf(&pdf).unwrap();
    assert_eq!(report.page_count, 2);
    assert!(report.pages.is_empty());
    assert_eq!(count_images(&pdf).unwrap(), 0);
}

#[test]
fn form_xobjects_are_vector_and_searched() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = tmp.path().join("form.pdf");
    common::write_pdf_with_form(&pdf);

    let report = inspect_pdf(&pdf).unwrap();
    assert_eq!(report.raster_images, 1);
    assert_eq!(report.vector_images, 1);
    let form = report.pages[0]
        .images
        .iter()
        .find(|i| i.kind == ImageKind::Vector)
        .unwrap();
    assert_eq!((form.width, form.height), (100, 50));
}

#[test]
fn inherited_resources_count_on_every_page() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = tmp.path().join("shared.pdf");
    common::write_pdf_inherited(&pdf);
    let report = inspect_pdf(&pdf).unwrap();
    assert_eq!(report.page_count, 2);
    assert_eq!(report.raster_images, 2);
}

#[test]
fn garbage_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = tmp.path().join("broken.pdf");
    std::fs::write(&pdf, b"definitely not a pdf").unwrap();
    assert!(inspect_pdf(&pdf).is_err());
    assert!(count_images(&pdf).is_err());
}
