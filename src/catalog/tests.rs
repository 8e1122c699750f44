use super::*;

#[test]
fn test_builtin_catalog_is_valid() {
    let catalog = ReferenceCatalog::builtin();
    catalog.validate().unwrap();

    assert_eq!(
        catalog.internal_standards(Chromatography::Hilic, Polarity::Positive).len(),
        18
    );
    assert_eq!(catalog.methods().count(), 3);
}

#[test]
fn test_internal_standard_lookup() {
    let catalog = ReferenceCatalog::builtin();
    let standard = catalog
        .internal_standard(Chromatography::Hilic, Polarity::Positive, "Methionine d8")
        .unwrap();
    assert_eq!(standard.retention_time, 7.479);

    let err = catalog
        .internal_standard(Chromatography::Hilic, Polarity::Negative, "Methionine d8")
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::ReferenceNotFound);
}

#[test]
fn test_polarity_panels_are_disjoint() {
    let catalog = ReferenceCatalog::builtin();
    for chromatography in catalog.methods() {
        let pos = catalog.internal_standards(chromatography, Polarity::Positive);
        let neg = catalog.internal_standards(chromatography, Polarity::Negative);
        assert!(pos.iter().all(|p| neg.iter().all(|n| n.name != p.name)));
    }
}

#[test]
fn test_overlapping_polarity_rejected() {
    let toml = r#"
        [[HILIC.internal_standards.positive]]
        name = "Methionine d8"
        retention_time = 7.479
        precursor_mz = 158.1085

        [[HILIC.internal_standards.negative]]
        name = "Methionine d8"
        retention_time = 7.479
        precursor_mz = 156.0939
    "#;

    let err = ReferenceCatalog::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, CatalogError::OverlappingPolarity { .. }));
}

#[test]
fn test_unknown_method_rejected() {
    let toml = r#"
        [[GC.internal_standards.positive]]
        name = "X"
        retention_time = 1.0
        precursor_mz = 100.0
    "#;
    let err = ReferenceCatalog::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, CatalogError::UnknownChromatography(m) if m == "GC"));
}

#[test]
fn test_toml_roundtrip() {
    let catalog = ReferenceCatalog::builtin();
    let toml = catalog.to_toml_string().unwrap();
    let restored = ReferenceCatalog::from_toml_str(&toml).unwrap();
    assert_eq!(restored, catalog);
}

#[test]
fn test_targeted_metabolites() {
    let catalog = ReferenceCatalog::builtin();

    assert_eq!(catalog.biological_standards(Chromatography::Hilic), vec!["Urine"]);
    let creatinine = catalog
        .targeted_metabolite(Chromatography::Hilic, "Urine", Polarity::Positive, "Creatinine")
        .unwrap();
    assert_eq!(creatinine.retention_time, 4.25);

    let by_key = catalog
        .metabolite_by_inchikey(
            Chromatography::Hilic,
            "Urine",
            Polarity::Positive,
            "DDRJAANPRJIHGJ-UHFFFAOYSA-N",
        )
        .unwrap();
    assert_eq!(by_key.name, "Creatinine");

    assert!(catalog
        .targeted_metabolites(Chromatography::Hilic, "Plasma", Polarity::Positive)
        .is_none());
}

#[test]
fn test_scalar_map_flattening() {
    let catalog = ReferenceCatalog::builtin();
    let map = catalog.to_scalar_map(Some(Chromatography::Hilic));

    assert_eq!(
        map.get("HILIC.pos.Methionine d8.retention_time"),
        Some(&serde_json::json!(7.479))
    );
    assert!(map.contains_key("HILIC.Urine.neg.Citric acid.inchikey"));
    assert!(map.keys().all(|k| k.starts_with("HILIC.")));
}

#[test]
fn test_parse_names() {
    assert_eq!("hilic".parse::<Chromatography>().unwrap(), Chromatography::Hilic);
    assert_eq!("Lipidomics".parse::<Chromatography>().unwrap(), Chromatography::Lipidomics);
    assert_eq!("Neg".parse::<Polarity>().unwrap(), Polarity::Negative);
}

#[test]
fn test_panel_lookup() {
    let catalog = ReferenceCatalog::builtin();
    let urine = Panel::BiologicalStandard("Urine".to_string());

    assert_eq!(
        catalog.panel(Chromatography::Hilic, &Panel::InternalStandards, Polarity::Positive).len(),
        18
    );
    assert!(!catalog.panel(Chromatography::Hilic, &urine, Polarity::Negative).is_empty());
    assert!(catalog.panel(Chromatography::Lipidomics, &urine, Polarity::Positive).is_empty());

    let err = catalog
        .entry(Chromatography::Hilic, &urine, Polarity::Positive, "Methionine d8")
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::ReferenceNotFound);
    assert_eq!(urine.name_column(), "Metabolite");
}
