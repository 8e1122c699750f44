//! Builtin internal standard and biological standard panels.
//!
//! m/z values are monoisotopic [M+H]+ (positive) or [M-H]- (negative).

use std::collections::BTreeMap;

use super::{Chromatography, LibraryEntry, MethodCatalog, PolarityPanels};

type Row = (&'static str, f64, f64);
type KeyedRow = (&'static str, &'static str, f64, f64);

const HILIC_POS: &[Row] = &[
    ("Methionine d8", 7.479, 158.1085),
    ("1-Methylnicotinamide d3", 5.102, 140.0898),
    ("Creatinine d3", 4.211, 117.0850),
    ("Carnitine d3", 8.524, 165.1313),
    ("Acetylcholine d9", 6.917, 155.1740),
    ("Glutamine d5", 9.883, 152.1078),
    ("Trimethylamine N-oxide d9", 7.205, 85.1322),
    ("Hippuric acid d5", 2.614, 185.0969),
    ("Tryptophan d5", 7.812, 210.1285),
    ("Phenylalanine d8", 7.388, 174.1365),
    ("Caffeine d9", 1.603, 204.1441),
    ("Leucine d10", 8.296, 142.1647),
    ("Valine d8", 8.994, 126.1365),
    ("Arginine 13C6 15N4", 12.402, 185.1272),
    ("Betaine d9", 8.107, 127.1427),
    ("Proline d7", 9.215, 123.1145),
    ("Adenosine 13C5", 4.436, 273.1208),
    ("Choline d9", 6.204, 113.1635),
];

const HILIC_NEG: &[Row] = &[
    ("Glucose 13C6", 9.612, 185.0762),
    ("Citric acid d4", 11.804, 195.0448),
    ("Succinic acid d4", 6.923, 121.0444),
    ("Lactic acid 13C3", 5.318, 92.0345),
    ("Glutamic acid d5", 10.497, 151.0773),
    ("Aspartic acid d3", 11.015, 135.0491),
    ("Uric acid 15N2", 5.604, 169.0151),
    ("Taurine d4", 8.902, 128.0325),
    ("Xanthine 15N2", 4.587, 153.0202),
    ("Malic acid d3", 9.311, 136.0331),
];

const C18_POS: &[Row] = &[
    ("Tryptophan d5", 3.221, 210.1285),
    ("Phenylalanine d8", 2.604, 174.1365),
    ("Caffeine d9", 4.118, 204.1441),
    ("Hippuric acid d5", 4.806, 185.0969),
    ("Kynurenine d4", 2.415, 213.1172),
    ("Indole-3-acetic acid d5", 6.312, 181.1020),
];

const C18_NEG: &[Row] = &[
    ("Cholic acid d4", 9.788, 411.3054),
    ("Deoxycholic acid d4", 11.203, 395.3105),
    ("Palmitic acid d31", 14.912, 286.4275),
    ("Indoxyl sulfate 13C6", 4.705, 218.0224),
];

const LIPIDOMICS_POS: &[Row] = &[
    ("PC 15:0-18:1 d7", 10.214, 753.6134),
    ("LPC 18:1 d7", 4.108, 529.3994),
    ("SM d18:1-18:1 d9", 9.301, 738.6470),
    ("TG 15:0-18:1-15:0 d7", 17.502, 812.7719),
    ("Cholesterol d7", 14.806, 394.4061),
];

const LIPIDOMICS_NEG: &[Row] = &[
    ("PE 15:0-18:1 d7", 10.607, 709.5519),
    ("PG 15:0-18:1 d7", 9.711, 740.5464),
    ("PI 15:0-18:1 d7", 9.104, 828.5625),
    ("LPE 18:1 d7", 4.012, 485.3379),
];

const URINE_HILIC_POS: &[KeyedRow] = &[
    ("Creatinine", "DDRJAANPRJIHGJ-UHFFFAOYSA-N", 4.25, 114.0662),
    ("Carnitine", "PHIQHXFUZVPYII-ZCFIWIBFSA-N", 8.58, 162.1125),
    ("Hippuric acid", "QIAFMBKCNZACKA-UHFFFAOYSA-N", 2.65, 180.0655),
    ("Trimethylamine N-oxide", "UYPYRKYUKCHHIB-UHFFFAOYSA-N", 7.25, 76.0757),
    ("Betaine", "KWIUHFFTVRNATP-UHFFFAOYSA-N", 8.15, 118.0863),
    ("Tryptophan", "QIVBCDIJIAJPQS-VIFPVBQESA-N", 7.85, 205.0972),
];

const URINE_HILIC_NEG: &[KeyedRow] = &[
    ("Citric acid", "KRKNYBCHXYNGOX-UHFFFAOYSA-N", 11.85, 191.0197),
    ("Uric acid", "LEHOTFFKMJEONL-UHFFFAOYSA-N", 5.65, 167.0211),
    ("Taurine", "XOAAWQZATWQOTB-UHFFFAOYSA-N", 8.95, 124.0074),
    ("Glucose", "WQZGKKKJIJFFOK-GASJEMHNSA-N", 9.65, 179.0561),
];

const URINE_C18_POS: &[KeyedRow] = &[
    ("Tryptophan", "QIVBCDIJIAJPQS-VIFPVBQESA-N", 3.25, 205.0972),
    ("Hippuric acid", "QIAFMBKCNZACKA-UHFFFAOYSA-N", 4.84, 180.0655),
];

const URINE_C18_NEG: &[KeyedRow] = &[
    ("Indoxyl sulfate", "BXFFHSIDQOFMLE-UHFFFAOYSA-N", 4.73, 212.0023),
];

const PLASMA_LIPIDOMICS_POS: &[KeyedRow] = &[
    ("LPC 16:0", "SPJFYYJXNPEZDW-FTJOPAKQSA-N", 3.92, 496.3398),
    ("PC 34:1", "WTJKGGKOPKCXLL-VYOBOKEXSA-N", 10.41, 760.5851),
];

const PLASMA_LIPIDOMICS_NEG: &[KeyedRow] = &[
    ("PE 38:4", "DRIVXEVMDWCWLI-CAQMIEAISA-N", 10.82, 766.5392),
    ("Palmitic acid", "IPCSVZSSVZVIGE-UHFFFAOYSA-N", 12.36, 255.2330),
];

fn entries(rows: &[Row]) -> Vec<LibraryEntry> {
    rows.iter()
        .map(|&(name, rt, mz)| LibraryEntry::new(name, rt, mz))
        .collect()
}

fn keyed_entries(rows: &[KeyedRow]) -> Vec<LibraryEntry> {
    rows.iter()
        .map(|&(name, inchikey, rt, mz)| LibraryEntry {
            inchikey: Some(inchikey.to_string()),
            ..LibraryEntry::new(name, rt, mz)
        })
        .collect()
}

fn method(
    positive: &[Row],
    negative: &[Row],
    biological_standards: &[(&str, &[KeyedRow], &[KeyedRow])],
) -> MethodCatalog {
    MethodCatalog {
        internal_standards: PolarityPanels {
            positive: entries(positive),
            negative: entries(negative),
        },
        biological_standards: biological_standards
            .iter()
            .map(|&(name, pos, neg)| {
                (
                    name.to_string(),
                    PolarityPanels {
                        positive: keyed_entries(pos),
                        negative: keyed_entries(neg),
                    },
                )
            })
            .collect(),
    }
}

pub(super) fn methods() -> BTreeMap<Chromatography, MethodCatalog> {
    let mut methods = BTreeMap::new();
    methods.insert(
        Chromatography::Hilic,
        method(HILIC_POS, HILIC_NEG, &[("Urine", URINE_HILIC_POS, URINE_HILIC_NEG)]),
    );
    methods.insert(
        Chromatography::C18,
        method(C18_POS, C18_NEG, &[("Urine", URINE_C18_POS, URINE_C18_NEG)]),
    );
    methods.insert(
        Chromatography::Lipidomics,
        method(
            LIPIDOMICS_POS,
            LIPIDOMICS_NEG,
            &[("Plasma", PLASMA_LIPIDOMICS_POS, PLASMA_LIPIDOMICS_NEG)],
        ),
    );
    methods
}
