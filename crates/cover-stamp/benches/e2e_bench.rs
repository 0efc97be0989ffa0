//! End-to-end pipeline benchmarks: tag + bytes → dispatch → stamped bytes.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use cover_core::asset::CoverAsset;
use cover_core::dispatch;
use cover_core::document::{DocumentFormat, SourceDocument};
use cover_core::pipeline::{Pipeline, PipelineBuilder};
use cover_epub::EpubCoverInserter;
use cover_pdf::PdfCoverInserter;
use cover_utils::archive::ZipBuilder;
use cover_utils::xml::xhtml_document;

fn make_pipeline() -> Arc<Pipeline> {
    let img = image::RgbImage::from_pixel(800, 1200, image::Rgb([120, 20, 60]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    let cover = CoverAsset::from_bytes(buf).unwrap();

    Arc::new(
        PipelineBuilder::new()
            .cover(Arc::new(cover))
            .inserter(Box::new(PdfCoverInserter))
            .inserter(Box::new(EpubCoverInserter::default()))
            .build()
            .unwrap(),
    )
}

/// Generate a PDF with N text pages.
fn generate_pdf(num_pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let mut kids: Vec<Object> = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 11.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!(
                        "Chapter {}. Lorem ipsum dolor sit amet, consectetur adipiscing elit.",
                        i
                    ))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        kids.push(
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into(),
        );
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
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Generate an EPUB 2 book with N chapters and no TOC.
fn generate_epub(num_chapters: usize) -> Vec<u8> {
    let mut manifest = String::new();
    let mut spine = String::new();
    for i in 0..num_chapters {
        manifest.push_str(&format!(
            "<item id=\"c{}\" href=\"c{}.xhtml\" media-type=\"application/xhtml+xml\"/>",
            i, i
        ));
        spine.push_str(&format!("<itemref idref=\"c{}\"/>", i));
    }
    let opf = format!(
        "<?xml version=\"1.0\"?><package xmlns=\"http://www.idpf.org/2007/opf\" version=\"2.0\"><metadata/><manifest>{}</manifest><spine>{}</spine></package>",
        manifest, spine
    );

    let mut zip = ZipBuilder::in_memory();
    zip.add_stored("mimetype", b"application/epub+zip").unwrap();
    zip.add_file(
        "META-INF/container.xml",
        br#"<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container"><rootfiles><rootfile full-path="content.opf" media-type="application/oebps-package+xml"/></rootfiles></container>"#,
    )
    .unwrap();
    zip.add_file("content.opf", opf.as_bytes()).unwrap();
    for i in 0..num_chapters {
        let body = format!(
            "<h1>Chapter {}</h1>\n<p>Duis aute irure dolor in reprehenderit in voluptate velit \
             esse cillum dolore eu fugiat nulla pariatur.</p>",
            i
        );
        let doc = xhtml_document(&format!("Chapter {}", i), None, &body, false);
        zip.add_file(&format!("c{}.xhtml", i), doc.as_bytes()).unwrap();
    }
    zip.into_bytes().unwrap()
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("E2E_Transform");
    group.sample_size(10);
    let pipeline = make_pipeline();

    for n in [10, 100] {
        let pdf = generate_pdf(n);
        group.bench_function(format!("pdf_{}_pages", n), |b| {
            b.iter(|| {
                pipeline
                    .transform("pdf", black_box(pdf.clone()), Some("bench.pdf"))
                    .unwrap()
            });
        });

        let epub = generate_epub(n);
        group.bench_function(format!("epub_{}_chapters", n), |b| {
            b.iter(|| {
                pipeline
                    .transform("epub", black_box(epub.clone()), Some("bench.epub"))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("E2E_Dispatch");
    group.sample_size(10);
    let pipeline = make_pipeline();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let pdf = generate_pdf(50);

    group.bench_function("pdf_50_pages_8_concurrent", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let mut handles = Vec::new();
                for _ in 0..8 {
                    let source = SourceDocument::new(pdf.clone(), DocumentFormat::Pdf);
                    handles.push(tokio::spawn(dispatch::transform_with_timeout(
                        pipeline.clone(),
                        source,
                        Duration::from_secs(30),
                    )));
                }
                for handle in handles {
                    handle.await.unwrap().unwrap();
                }
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_transform, bench_dispatch);
criterion_main!(benches);
