use assert_matches::assert_matches;
use camino::Utf8Path;

use expdata::config::ProfileLoader;
use expdata::error::ExpdataError;

#[test]
fn resolve_profile_from_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("expdata.json");
    std::fs::write(
        &path,
        br#"{
            "categories": ["abr_io", "efr"],
            "include_side": true,
            "member": "io.json",
            "queries": [
                "output.ch.channel",
                {"name": "gain", "query": "output.ch.gain"}
            ]
        }"#,
    )
    .unwrap();

    let resolved = ProfileLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.categories, vec!["abr_io", "efr"]);
    assert!(resolved.include_side);
    assert_eq!(resolved.queries.len(), 2);
    assert_eq!(resolved.queries[0].0, "channel");

    let parser = resolved.filename_parser().unwrap();
    let record = parser
        .parse(Utf8Path::new("20230101-120000 alice mouse1 left abr_io.csv"))
        .unwrap();
    assert!(record.side.is_some());

    assert!(resolved.query_loader().unwrap().is_some());
}

#[test]
fn resolve_rejects_unparseable_profile() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("expdata.json");
    std::fs::write(&path, b"{ not json }").unwrap();

    let err = ProfileLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, ExpdataError::ProfileParse(_));
}

#[test]
fn resolve_reports_missing_explicit_profile() {
    let err = ProfileLoader::resolve(Some("/nonexistent/expdata.json")).unwrap_err();
    assert_matches!(err, ExpdataError::ProfileRead(_));
}
