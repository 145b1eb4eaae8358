use lf_case::schema::*;
use lf_case::{load_json, load_yaml, save_json, save_yaml, validate_case};
use std::path::Path;

fn windkessel_case() -> Case {
    Case {
        version: 1,
        name: "Single Outlet".to_string(),
        fluid: FluidDef { rho: 1000.0 },
        patches: vec![PatchDef {
            name: "outlet".to_string(),
            faces: FacesDef {
                areas: vec![1e-4, 2e-4],
                normals: vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            },
            boundary: BoundaryDef::Windkessel(WindkesselDef {
                phi: "phi".to_string(),
                order: 3,
                r: 1.2e8,
                c: 8.0e-9,
                z: 6.0e6,
                p0: 1.3e4,
                p_1: Some(1.29e4),
                p_2: None,
                q_1: 2.0e-5,
                q_2: Some(1.9e-5),
                q_3: None,
            }),
            last_update_time: None,
        }],
    }
}

#[test]
fn roundtrip_yaml_windkessel_case() {
    let case = windkessel_case();
    validate_case(&case).unwrap();

    let path = std::env::temp_dir().join("lf_case_roundtrip_windkessel.yaml");
    save_yaml(&path, &case).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(case, loaded);
}

#[test]
fn roundtrip_json_windkessel_case() {
    let case = windkessel_case();
    let path = std::env::temp_dir().join("lf_case_roundtrip_windkessel.json");
    save_json(&path, &case).unwrap();
    let loaded = load_json(&path).unwrap();

    assert_eq!(case, loaded);
}

#[test]
fn invalid_case_is_not_saved() {
    let mut case = windkessel_case();
    if let BoundaryDef::Windkessel(wk) = &mut case.patches[0].boundary {
        wk.c = 0.0;
    }
    let path = std::env::temp_dir().join("lf_case_invalid_not_saved.yaml");
    let _ = std::fs::remove_file(&path);
    assert!(save_yaml(&path, &case).is_err());
    assert!(!path.exists());
}

#[test]
fn sample_cases_load_and_validate() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../cases");
    for name in ["three_outlets.yaml"] {
        let case = load_yaml(&root.join(name))
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", name, e));
        assert_eq!(case.patches.len(), 3);
        assert!(matches!(
            case.patch("descending_aorta").map(|p| &p.boundary),
            Some(BoundaryDef::VectorFittingImpedance(_))
        ));
    }
}
