//! Benchmarks for PDF cover insertion.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use cover_core::asset::CoverAsset;
use cover_pdf::{build_cover_page, PdfCoverInserter};

fn make_cover(width: u32, height: u32) -> CoverAsset {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 30, 30]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    CoverAsset::from_bytes(buf).unwrap()
}

/// Create a PDF with N pages of text.
fn make_pdf(num_pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!(
                        "Page {}: Lorem ipsum dolor sit amet, consectetur adipiscing elit.",
                        i
                    ))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => num_pages as i64,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn bench_cover_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("PDF_Cover_Page");

    for (label, w, h) in [("small_200x300", 200, 300), ("large_1200x1800", 1200, 1800)] {
        let cover = make_cover(w, h);
        group.bench_function(label, |b| {
            b.iter(|| build_cover_page(black_box(&cover)).unwrap());
        });
    }

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("PDF_Insert_Cover");
    group.sample_size(20);
    let cover = make_cover(600, 900);

    for n in [10, 100, 500] {
        let source = make_pdf(n);
        group.bench_function(format!("{}_pages", n), |b| {
            b.iter(|| PdfCoverInserter.insert_cover(black_box(&source), &cover).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cover_page, bench_insert);
criterion_main!(benches);
