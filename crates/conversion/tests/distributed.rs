//! Loading exported fields onto a partitioned mesh across ranks.

use conversion::{
    run, ConversionConfig, ConversionError, ConvertJob, DistributedFieldLoader, GmshOutput,
    MessageStream, RecordExporter,
};
use distributed_mesh::{Communicator, Coordinates, Grid, SerialComm, ThreadComm};
use record_io::{Compression, RecordReader, RecordWriter};
use test_utils::{
    create_sequential_values, create_temperature_values, temp_test_dir, write_grib_file,
    Grib2Builder, GridLayout,
};

const N: u32 = 8;

fn octahedral_fields() -> (Vec<Vec<u8>>, Vec<Vec<f64>>) {
    let size = Grid::from_name("O8").unwrap().size();
    let t = create_temperature_values(size);
    let u = create_sequential_values(size, -100.0);
    let messages = vec![
        Grib2Builder::new_octahedral(N)
            .with_isobaric_hpa(850)
            .with_data(t.clone())
            .build(),
        Grib2Builder::new_octahedral(N)
            .with_parameter(2, 2)
            .with_isobaric_hpa(500)
            .with_data(u.clone())
            .build(),
    ];
    (messages, vec![t, u])
}

fn export_to(dir: &std::path::Path) -> (std::path::PathBuf, Vec<Vec<f64>>) {
    let (messages, payloads) = octahedral_fields();
    let input = write_grib_file(dir, "o8.grib2", &messages);
    let output = dir.join("o8.atlas");
    let mut stream = MessageStream::open(&input).unwrap();
    let mut writer = RecordWriter::new(&output).with_array_compression(Compression::Deflate);
    RecordExporter::new(Compression::Deflate)
        .export(&mut stream, &mut writer)
        .unwrap();
    (output, payloads)
}

#[test]
fn test_every_rank_sees_owned_and_halo_values() {
    let dir = temp_test_dir();
    let (output, payloads) = export_to(dir.path());

    for ranks in [1, 2, 4] {
        let per_rank = ThreadComm::run(ranks, |comm| {
            let reader = RecordReader::open(&output).unwrap();
            let loader = DistributedFieldLoader::new(&reader, &comm, 0).unwrap();
            assert_eq!(loader.grid_name(), "O8");
            assert_eq!(loader.field_count(), 2);
            let loaded = loader.load_all().unwrap();

            assert_eq!(loaded.fields().names(), vec!["t[850]", "u[500]"]);
            let mesh = loaded.function_space().mesh();
            for (field, expected) in loaded.fields().iter().zip(&payloads) {
                for (local, global) in mesh.global_index().iter().enumerate() {
                    assert_eq!(field.values()[local], expected[*global]);
                }
            }
            mesh.halo_size()
        });
        if ranks > 1 {
            assert!(per_rank.iter().all(|halo| *halo > 0));
        }
    }
}

#[test]
fn test_phases_run_field_by_field() {
    let dir = temp_test_dir();
    let (output, payloads) = export_to(dir.path());

    let gathered = ThreadComm::run(3, |comm| {
        let reader = RecordReader::open(&output).unwrap();
        let mut loader = DistributedFieldLoader::new(&reader, &comm, 2).unwrap();

        let ingested = loader.ingest(1).unwrap();
        assert_eq!(ingested.name(), "u[500]");
        loader.distribute(ingested).unwrap();

        assert!(matches!(
            loader.ingest(2),
            Err(ConversionError::MissingKey(_))
        ));

        let loaded = loader.synchronize().unwrap();
        loaded.gather().unwrap()
    });

    // Only the coordinator holds global fields
    assert!(gathered[0][0].is_empty());
    assert!(gathered[1][0].is_empty());
    assert_eq!(gathered[2][0].values(), &payloads[1][..]);
}

#[test]
fn test_array_size_must_match_grid() {
    let dir = temp_test_dir();
    let input = write_grib_file(
        dir.path(),
        "short.grib2",
        &[Grib2Builder::new_regular_gaussian(128)
            .with_data(vec![1.0, 2.0, 3.0])
            .build()],
    );
    let output = dir.path().join("short.atlas");
    let mut stream = MessageStream::open(&input).unwrap();
    let mut writer = RecordWriter::new(&output);
    RecordExporter::new(Compression::None)
        .export(&mut stream, &mut writer)
        .unwrap();

    let reader = RecordReader::open(&output).unwrap();
    let loader = DistributedFieldLoader::new(&reader, &SerialComm, 0).unwrap();
    assert!(matches!(
        loader.ingest(0),
        Err(ConversionError::SizeMismatch {
            expected: 131072,
            found: 3,
            ..
        })
    ));
}

#[test]
fn test_full_run_writes_gmsh_from_coordinator() {
    let dir = temp_test_dir();
    let (messages, _) = octahedral_fields();
    let input = write_grib_file(dir.path(), "in.grib", &messages);
    let job = ConvertJob {
        input,
        output: dir.path().join("out.atlas"),
        gmsh: Some(GmshOutput {
            path: dir.path().join("out.msh"),
            coordinates: Coordinates::Xyz,
        }),
        config: ConversionConfig {
            compression: Compression::Deflate,
            coordinator: 1,
        },
    };

    let reports = ThreadComm::run(3, |comm| (comm.rank(), run(&job, &comm).unwrap()));

    for (rank, report) in &reports {
        assert_eq!(report.export.is_some(), *rank == 1);
        assert_eq!(report.loaded_fields, vec!["t[850]", "u[500]"]);
    }
    let summary = reports[1].1.export.as_ref().unwrap();
    assert_eq!(summary.grid_name, "O8");
    assert_eq!(summary.fields.len(), 2);

    let msh = std::fs::read_to_string(dir.path().join("out.msh")).unwrap();
    let grid_size = Grid::from_name("O8").unwrap().size();
    assert!(msh.contains(&format!("$Nodes\n{}\n", grid_size)));
    assert_eq!(msh.matches("$NodeData").count(), 2);
    assert!(msh.contains("\"u[500]\""));
}

/// A classic reduced Gaussian N4 grid, 226 points.
const CLASSIC_PL: [u32; 8] = [20, 25, 32, 36, 36, 32, 25, 20];

#[test]
fn test_classic_grid_loads_with_its_row_lengths() {
    let dir = temp_test_dir();
    let layout = GridLayout::ReducedGaussian {
        n: 4,
        pl: CLASSIC_PL.to_vec(),
    };
    let values = create_sequential_values(layout.num_points(), 0.5);
    let input = write_grib_file(
        dir.path(),
        "n4.grib2",
        &[Grib2Builder::with_layout(layout)
            .with_data(values.clone())
            .build()],
    );
    let output = dir.path().join("n4.atlas");
    let mut stream = MessageStream::open(&input).unwrap();
    let mut writer = RecordWriter::new(&output);
    let summary = RecordExporter::new(Compression::None)
        .export(&mut stream, &mut writer)
        .unwrap();
    assert_eq!(summary.grid_name, "N4");

    let reader = RecordReader::open(&output).unwrap();
    assert_eq!(
        reader.read_integers("grid.pl").unwrap(),
        CLASSIC_PL.iter().map(|p| *p as i64).collect::<Vec<_>>()
    );

    let per_rank = ThreadComm::run(2, |comm| {
        let reader = RecordReader::open(&output).unwrap();
        let loader = DistributedFieldLoader::new(&reader, &comm, 0).unwrap();
        let loaded = loader.load_all().unwrap();
        let mesh = loaded.function_space().mesh();
        assert_eq!(mesh.grid().size(), 226);
        assert_eq!(mesh.grid().points_in_row(3), 36);
        let field = loaded.fields().get("t[850]").unwrap();
        mesh.global_index()
            .iter()
            .enumerate()
            .all(|(local, global)| field.values()[local] == values[*global])
    });
    assert_eq!(per_rank, vec![true, true]);
}

#[test]
fn test_classic_grid_without_row_lengths_is_unresolved() {
    let dir = temp_test_dir();
    let path = dir.path().join("n4.atlas");
    let mut writer = RecordWriter::new(&path);
    writer.set("grid.name", "N4");
    writer.set("fields.size", 0i64);
    writer.write().unwrap();

    let reader = RecordReader::open(&path).unwrap();
    assert!(matches!(
        DistributedFieldLoader::new(&reader, &SerialComm, 0),
        Err(ConversionError::GridResolution(name)) if name == "N4"
    ));
}
