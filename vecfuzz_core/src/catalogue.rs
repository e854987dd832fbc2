//! The fixed set of strategies a pipeline can be built from, addressed by stable kebab-case keys.

use crate::format::FormatFamily;
use crate::mutator::*;

/// One catalogue row: a key, the family it targets and a constructor.
#[derive(Clone, Copy)]
pub struct CatalogueEntry {
    pub key: &'static str,
    pub family: FormatFamily,
    build: fn() -> Box<dyn Mutator>,
}

impl CatalogueEntry {
    const fn new(key: &'static str, family: FormatFamily, build: fn() -> Box<dyn Mutator>) -> Self {
        Self { key, family, build }
    }

    pub fn build(&self) -> Box<dyn Mutator> {
        (self.build)()
    }
}

impl std::fmt::Debug for CatalogueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogueEntry")
            .field("key", &self.key)
            .field("family", &self.family)
            .finish()
    }
}

macro_rules! entry {
    ($key:literal, $family:ident, $mutator:ident) => {
        CatalogueEntry::new($key, FormatFamily::$family, || Box::new($mutator))
    };
}

static CATALOGUE: [CatalogueEntry; 34] = [
    entry!("repeat", Plaintext, RepeatMutator),
    entry!("substring", Plaintext, SubstringMutator),
    entry!("bit-flip", Plaintext, BitFlipMutator),
    entry!("byte-flip", Plaintext, ByteFlipMutator),
    entry!("csv-repeat-row", Csv, CsvRepeatRowMutator),
    entry!("csv-empty-row", Csv, CsvEmptyRowMutator),
    entry!("csv-repeat-col", Csv, CsvRepeatColMutator),
    entry!("csv-empty-col", Csv, CsvEmptyColMutator),
    entry!("csv-empty-col-keep-header", Csv, CsvEmptyColKeepHeaderMutator),
    entry!("csv-multiply-cell", Csv, CsvMultiplyCellMutator),
    entry!("csv-empty-cell", Csv, CsvEmptyCellMutator),
    entry!("json-int", Json, JsonIntMutator),
    entry!("json-extreme-int", Json, JsonExtremeIntMutator),
    entry!("json-float-inf", Json, JsonFloatInfMutator),
    entry!("json-float-nan", Json, JsonFloatNanMutator),
    entry!("json-repeat-list", Json, JsonRepeatListMutator),
    entry!("json-repeat-entry", Json, JsonRepeatEntryMutator),
    entry!("json-change-type", Json, JsonChangeTypeMutator),
    entry!("xml-nested-tags", Xml, XmlNestedTagsMutator),
    entry!("xml-attributes", Xml, XmlAttributeMutator),
    entry!("xml-href", Xml, XmlHrefMutator),
    entry!("xml-rename-tags", Xml, XmlRenameTagsMutator),
    entry!("xml-root-tag", Xml, XmlRootTagMutator),
    entry!("xml-repeat-children", Xml, XmlRepeatChildrenMutator),
    entry!("jpeg-size", Jpeg, JpegSizeMutator),
    entry!("jpeg-width", Jpeg, JpegWidthMutator),
    entry!("jpeg-height", Jpeg, JpegHeightMutator),
    entry!("jpeg-header-bit-flip", Jpeg, JpegHeaderBitFlipMutator),
    entry!("jpeg-header-byte-flip", Jpeg, JpegHeaderByteFlipMutator),
    entry!("binary-insert", Binary, BinaryInsertMutator),
    entry!("binary-replace", Binary, BinaryReplaceMutator),
    entry!("binary-append", Binary, BinaryAppendMutator),
    entry!("binary-shuffle", Binary, BinaryShuffleMutator),
    entry!("binary-repeat", Binary, BinaryRepeatMutator),
];

/// Every strategy, grouped by family in a stable order.
pub fn all() -> &'static [CatalogueEntry] {
    &CATALOGUE
}

pub fn entry(key: &str) -> Option<&'static CatalogueEntry> {
    CATALOGUE.iter().find(|e| e.key == key)
}

/// A fresh instance of the strategy registered under `key`.
pub fn by_key(key: &str) -> Option<Box<dyn Mutator>> {
    entry(key).map(CatalogueEntry::build)
}

pub fn for_family(family: FormatFamily) -> Vec<&'static CatalogueEntry> {
    CATALOGUE.iter().filter(|e| e.family == family).collect()
}

pub fn keys() -> impl Iterator<Item = &'static str> {
    CATALOGUE.iter().map(|e| e.key)
}
