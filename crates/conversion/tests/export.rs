//! Export of GRIB2 files into record containers.

use conversion::{
    run, run_on_coordinator, ConversionConfig, ConversionError, ConvertJob,
    DistributedFieldLoader, MessageStream, RecordExporter,
};
use distributed_mesh::{Communicator, SerialComm, ThreadComm};
use record_io::{Compression, RecordReader, RecordWriter};
use test_utils::{create_temperature_values, temp_test_dir, write_grib_file, Grib2Builder};

fn export(input: &std::path::Path, output: &std::path::Path, compression: Compression) {
    let mut stream = MessageStream::open(input).unwrap();
    let mut writer = RecordWriter::new(output).with_array_compression(compression);
    RecordExporter::new(compression)
        .export(&mut stream, &mut writer)
        .unwrap();
}

#[test]
fn test_two_field_regular_gaussian_file() {
    let dir = temp_test_dir();
    let input = write_grib_file(
        dir.path(),
        "in.grib",
        &[
            Grib2Builder::new_regular_gaussian(128)
                .with_parameter(0, 0)
                .with_isobaric_hpa(850)
                .with_data(vec![1.0, 2.0, 3.0])
                .build(),
            Grib2Builder::new_regular_gaussian(128)
                .with_parameter(2, 2)
                .with_isobaric_hpa(500)
                .with_data(vec![4.0, 5.0, 6.0])
                .build(),
        ],
    );
    let output = dir.path().join("out.atlas");

    let mut stream = MessageStream::open(&input).unwrap();
    let mut writer = RecordWriter::new(&output);
    let summary = RecordExporter::new(Compression::None)
        .export(&mut stream, &mut writer)
        .unwrap();
    assert_eq!(summary.grid_name, "F128");
    assert_eq!(summary.grid_size, 3);

    let reader = RecordReader::open(&output).unwrap();
    assert_eq!(reader.read_string("grid.name").unwrap(), "F128");
    assert_eq!(reader.read_integer("fields.size").unwrap(), 2);

    assert_eq!(reader.read_string("fields[0].name").unwrap(), "t");
    assert_eq!(reader.read_string("fields[0].description").unwrap(), "Temperature");
    assert_eq!(reader.read_integer("fields[0].level").unwrap(), 850);
    assert_eq!(reader.read_doubles("fields[0].array").unwrap(), vec![1.0, 2.0, 3.0]);

    assert_eq!(reader.read_string("fields[1].name").unwrap(), "u");
    assert_eq!(
        reader.read_string("fields[1].description").unwrap(),
        "U component of wind"
    );
    assert_eq!(reader.read_integer("fields[1].level").unwrap(), 500);
    assert_eq!(reader.read_doubles("fields[1].array").unwrap(), vec![4.0, 5.0, 6.0]);

    assert!(!reader.contains("fields[2].name"));
}

#[test]
fn test_k_messages_round_trip_bit_identical() {
    const K: usize = 5;
    let dir = temp_test_dir();
    let payloads: Vec<Vec<f64>> = (0..K)
        .map(|i| {
            create_temperature_values(64)
                .into_iter()
                .map(|v| v + i as f64 / 3.0)
                .collect()
        })
        .collect();
    let messages: Vec<Vec<u8>> = payloads
        .iter()
        .enumerate()
        .map(|(i, values)| {
            Grib2Builder::new_octahedral(4)
                .with_isobaric_hpa(1000 - 100 * i as u32)
                .with_data(values.clone())
                .build()
        })
        .collect();
    let input = write_grib_file(dir.path(), "k.grib2", &messages);
    let output = dir.path().join("k.atlas");

    export(&input, &output, Compression::None);

    let reader = RecordReader::open(&output).unwrap();
    assert_eq!(reader.read_string("grid.name").unwrap(), "O4");
    assert_eq!(reader.read_integer("fields.size").unwrap(), K as i64);
    for (i, expected) in payloads.iter().enumerate() {
        let stored = reader.read_doubles(&format!("fields[{}].array", i)).unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&stored), bits(expected));
        assert_eq!(
            reader.read_integer(&format!("fields[{}].level", i)).unwrap(),
            1000 - 100 * i as i64
        );
    }
}

#[test]
fn test_deflate_export_reads_back_unchanged() {
    let dir = temp_test_dir();
    let values = create_temperature_values(GRID_O4_SIZE);
    let input = write_grib_file(
        dir.path(),
        "in.grib2",
        &[Grib2Builder::new_octahedral(4).with_data(values.clone()).build()],
    );
    let output = dir.path().join("out.atlas");

    export(&input, &output, Compression::Deflate);

    let reader = RecordReader::open(&output).unwrap();
    assert_eq!(reader.read_doubles("fields[0].array").unwrap(), values);
    assert_eq!(reader.read_string("grid.name").unwrap(), "O4");
}

const GRID_O4_SIZE: usize = 4 * 4 * (4 + 9);

#[test]
fn test_only_the_coordinator_writes() {
    let dir = temp_test_dir();
    let input = write_grib_file(
        dir.path(),
        "in.grib2",
        &[Grib2Builder::new_octahedral(4).build()],
    );
    let output = dir.path().join("out.atlas");

    let results = ThreadComm::run(3, |comm| {
        let written = run_on_coordinator(&comm, 1, || {
            let mut stream = MessageStream::open(&input)?;
            let mut writer = RecordWriter::new(&output);
            RecordExporter::new(Compression::None).export(&mut stream, &mut writer)
        })
        .unwrap();

        // Every rank is past the barrier only once the file is complete
        let reader = RecordReader::open(&output).unwrap();
        assert_eq!(reader.read_integer("fields.size").unwrap(), 1);
        (comm.rank(), written.is_some())
    });

    assert_eq!(results, vec![(0, false), (1, true), (2, false)]);
}

#[test]
fn test_export_failure_fails_every_rank() {
    let dir = temp_test_dir();
    let job = ConvertJob {
        input: dir.path().join("missing.grib2"),
        output: dir.path().join("out.atlas"),
        gmsh: None,
        config: ConversionConfig {
            coordinator: 2,
            ..Default::default()
        },
    };

    // Each rank reports its own error: the cause on the coordinator only
    let results = ThreadComm::run(3, |comm| run(&job, &comm).map(|_| ()));
    assert!(matches!(results[0], Err(ConversionError::CoordinatorFailed(2))));
    assert!(matches!(results[1], Err(ConversionError::CoordinatorFailed(2))));
    assert!(matches!(results[2], Err(ConversionError::Io { .. })));
    assert!(!job.output.exists());
}

#[test]
fn test_unrecognized_grid_passes_through_and_fails_to_load() {
    let dir = temp_test_dir();
    let input = write_grib_file(dir.path(), "ll.grib2", &[Grib2Builder::new_latlon().build()]);
    let output = dir.path().join("ll.atlas");

    export(&input, &output, Compression::None);

    let reader = RecordReader::open(&output).unwrap();
    assert_eq!(reader.read_string("grid.name").unwrap(), "regular_ll");
    assert!(matches!(
        DistributedFieldLoader::new(&reader, &SerialComm, 0),
        Err(ConversionError::GridResolution(name)) if name == "regular_ll"
    ));
}

#[test]
fn test_export_must_start_at_first_message() {
    let dir = temp_test_dir();
    let messages: Vec<Vec<u8>> = [850, 700, 500]
        .iter()
        .map(|level| Grib2Builder::new_octahedral(4).with_isobaric_hpa(*level).build())
        .collect();
    let input = write_grib_file(dir.path(), "three.grib2", &messages);
    let output = dir.path().join("three.atlas");

    let mut stream = MessageStream::open(&input).unwrap();
    assert!(stream.advance().unwrap());
    let mut writer = RecordWriter::new(&output);
    assert!(matches!(
        RecordExporter::new(Compression::None).export(&mut stream, &mut writer),
        Err(ConversionError::Format(_))
    ));
    assert!(!output.exists());

    let mut stream = MessageStream::open(&input).unwrap();
    RecordExporter::new(Compression::None)
        .export(&mut stream, &mut writer)
        .unwrap();
    assert!(stream.is_last());

    let reader = RecordReader::open(&output).unwrap();
    assert_eq!(reader.read_integer("fields.size").unwrap(), 3);
    let levels: Vec<i64> = (0..3)
        .map(|i| reader.read_integer(&format!("fields[{}].level", i)).unwrap())
        .collect();
    assert_eq!(levels, vec![850, 700, 500]);
}
