mod common;

use common::{PdfBuilder, Row};
use pdfloc_core::xref::{CrossReferenceType, XrefEntry, XrefPartBuilder};
use pdfloc_core::{ObjectId, PDFObject, ParsingOptions, PdfError, PdfIndex};

fn string(value: &str) -> PDFObject {
    PDFObject::String(value.as_bytes().to_vec())
}

/// Original revision plus one incremental update that replaces object 5.
fn updated_pdf() -> (Vec<u8>, u64, u64, u64) {
    let mut pdf = PdfBuilder::new("1.4");
    let catalog = pdf.object(1, 0, "<< /Type /Catalog >>");
    let old = pdf.object(5, 0, "(old)");
    let first = pdf.xref_table(
        &[(1, catalog), (5, old)],
        "<< /Size 6 /Root 1 0 R /Info 1 0 R >>",
    );
    pdf.startxref(first);
    let new = pdf.object(5, 0, "(new)");
    let second = pdf.xref_table(
        &[(5, new)],
        &format!("<< /Size 6 /Root 1 0 R /Prev {first} >>"),
    );
    pdf.startxref(second);
    (pdf.finish(), old, new, first)
}

#[test]
fn builder_output_is_stable() {
    let mut builder = XrefPartBuilder::new(CrossReferenceType::Table, 120);
    builder.add(1, 0, 17);
    builder.add(2, 0, 80);
    builder.set_previous(Some(9));
    let first = builder.build();
    let second = builder.build();
    assert_eq!(first.offsets(), second.offsets());
    assert_eq!(first.self_offset(), 120);
    assert_eq!(second.previous_offset(), Some(9));
}

#[test]
fn newest_generation_wins() {
    let (data, old, new, _) = updated_pdf();
    assert_ne!(old, new);
    let index = PdfIndex::open(&data, &ParsingOptions::strict()).unwrap();
    let table = index.table();

    assert_eq!(table.depth(), 2);
    assert_eq!(table.offset_of(&ObjectId::new(5, 0)), Some(new));
    assert_eq!(index.get_object(ObjectId::new(5, 0)).unwrap().object, string("new"));
    assert!(table.offset_of(&ObjectId::new(1, 0)).is_some());
}

#[test]
fn merged_trailer_inherits_and_drops_section_keys() {
    let (data, _, _, first) = updated_pdf();
    let index = PdfIndex::open(&data, &ParsingOptions::default()).unwrap();
    let trailer = index.table().trailer();

    assert_eq!(trailer.root(), Some(ObjectId::new(1, 0)));
    assert_eq!(trailer.info(), Some(ObjectId::new(1, 0)));
    assert_eq!(trailer.size(), Some(6));
    assert!(trailer.get("Prev").is_none());

    let chain = index.table().chain();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].previous, Some(first));
    assert_eq!(chain[1].offset, first);
    assert_eq!(chain[1].previous, None);
}

#[test]
fn prev_cycle_terminates() {
    let mut pdf = PdfBuilder::new("1.4");
    let catalog = pdf.object(1, 0, "<< /Type /Catalog >>");
    // the second table is written with a fixed-width Prev so the first
    // table can point forward at it
    let first_at = pdf.len();
    let second_at_guess = first_at + 200;
    let first = pdf.xref_table(
        &[(1, catalog)],
        &format!("<< /Size 2 /Root 1 0 R /Prev {second_at_guess:010} >>"),
    );
    assert_eq!(first, first_at);
    while pdf.len() < second_at_guess - 1 {
        pdf.raw(b"%");
    }
    pdf.raw(b"\n");
    let second = pdf.xref_table(&[], &format!("<< /Size 2 /Prev {first} >>"));
    assert_eq!(second, second_at_guess);
    pdf.startxref(second);
    let data = pdf.finish();

    for options in [ParsingOptions::default(), ParsingOptions::strict()] {
        let index = PdfIndex::open(&data, &options).unwrap();
        assert_eq!(index.table().depth(), 2);
        assert_eq!(index.table().offset_of(&ObjectId::new(1, 0)), Some(catalog));
    }
}

#[test]
fn hybrid_stream_outranks_its_table() {
    let mut pdf = PdfBuilder::new("1.5");
    let catalog = pdf.object(1, 0, "<< /Type /Catalog >>");
    let in_table = pdf.object(3, 0, "(table)");
    let in_stream = pdf.object(3, 0, "(stream)");
    let stream = pdf.xref_stream(
        8,
        &[
            (3, Row::InFile { offset: in_stream, genno: 0 }),
            (
                4,
                Row::Compressed {
                    stream_objid: 9,
                    index: 0,
                },
            ),
        ],
        "/Root 2 0 R /Size 10",
    );
    let table = pdf.xref_table(
        &[(1, catalog), (3, in_table)],
        &format!("<< /Size 10 /Root 1 0 R /XRefStm {stream} >>"),
    );
    pdf.startxref(table);
    let data = pdf.finish();

    let index = PdfIndex::open(&data, &ParsingOptions::strict()).unwrap();
    let merged = index.table();
    assert_eq!(merged.depth(), 1);
    assert_eq!(merged.kind(), CrossReferenceType::Table);
    assert_eq!(merged.offset_of(&ObjectId::new(3, 0)), Some(in_stream));
    assert_eq!(
        merged.get(&ObjectId::new(4, 0)),
        Some(&XrefEntry::Compressed {
            stream_objid: 9,
            index: 0
        })
    );
    assert_eq!(merged.trailer().root(), Some(ObjectId::new(1, 0)));
    assert!(merged.trailer().get("XRefStm").is_none());
    assert!(merged.trailer().get("Type").is_none());

    let kinds: Vec<_> = merged.chain().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, [CrossReferenceType::Table, CrossReferenceType::Stream]);

    assert_eq!(index.get_object(ObjectId::new(3, 0)).unwrap().object, string("stream"));
    assert!(matches!(
        index.get_object(ObjectId::new(4, 0)),
        Err(PdfError::ObjectInStream { stream_objid: 9, .. })
    ));
}

#[test]
fn xref_stream_only_document() {
    let mut pdf = PdfBuilder::new("1.5");
    let catalog = pdf.object(1, 0, "<< /Type /Catalog >>");
    let info = pdf.object(2, 0, "<< /Producer (test) >>");
    let stream = pdf.xref_stream(
        3,
        &[
            (0, Row::Free),
            (1, Row::InFile { offset: catalog, genno: 0 }),
            (2, Row::InFile { offset: info, genno: 0 }),
        ],
        "/Size 4 /Root 1 0 R /Info 2 0 R",
    );
    pdf.startxref(stream);
    let data = pdf.finish();

    let index = PdfIndex::open(&data, &ParsingOptions::strict()).unwrap();
    assert_eq!(index.table().kind(), CrossReferenceType::Stream);
    assert_eq!(index.table().len(), 2);
    assert_eq!(index.catalog().unwrap().offset, catalog);
    let trailer = index.table().trailer();
    assert_eq!(trailer.info(), Some(ObjectId::new(2, 0)));
    assert!(trailer.get("W").is_none());
    assert!(trailer.get("Length").is_none());
}

#[test]
fn broken_prev_is_partial_in_lenient_and_fatal_in_strict() {
    let mut pdf = PdfBuilder::new("1.4");
    let catalog = pdf.object(1, 0, "<< /Type /Catalog >>");
    let pages = pdf.object(2, 0, "<< /Type /Pages /Kids [] /Count 0 >>");
    // Prev lands on the `obj` keyword of object 2
    let xref = pdf.xref_table(
        &[(1, catalog), (2, pages)],
        &format!("<< /Size 3 /Root 1 0 R /Prev {} >>", pages + 4),
    );
    pdf.startxref(xref);
    let data = pdf.finish();

    let lenient = PdfIndex::open(&data, &ParsingOptions::default()).unwrap();
    assert_eq!(lenient.table().depth(), 1);
    assert_eq!(lenient.table().offset_of(&ObjectId::new(2, 0)), Some(pages));

    assert!(PdfIndex::open(&data, &ParsingOptions::strict()).is_err());
}
