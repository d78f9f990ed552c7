#[cfg(test)]
mod tests {
    use anyhow::Result;
    use csv_deidentifier::detection::{DetectedEntity, DetectionError, EntityDetector};
    use csv_deidentifier::masking::{Anonymizer, Operator, OperatorConfig};
    use csv_deidentifier::pipeline::report::NO_PII_LINE;
    use csv_deidentifier::{Deidentifier, PipelineError};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn parse_grid(text: &str) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_single_email_is_masked() -> Result<()> {
        let output = Deidentifier::default().deidentify("name,email\nAlice,alice@example.com\n")?;

        assert_eq!(output.csv, "name,email\nAlice,XXXXXX\n");
        assert_eq!(output.counts.get("EMAIL_ADDRESS"), 1);
        assert_eq!(output.counts.len(), 1);
        assert!(output.report.contains("Total Email Address found: 1"));

        Ok(())
    }

    #[test]
    fn test_header_only_input_round_trips() -> Result<()> {
        let input = "name,email\n";
        let output = Deidentifier::default().deidentify(input)?;

        assert_eq!(output.csv, input);
        assert!(output.counts.is_empty());
        assert!(output.report.contains(NO_PII_LINE));

        Ok(())
    }

    #[test]
    fn test_email_and_phone_in_one_cell() -> Result<()> {
        let input = "note\nReach alice@example.com or 415-555-0132\n";
        let output = Deidentifier::default().deidentify(input)?;

        assert_eq!(output.csv, "note\nReach XXXXXX or XXXXXX\n");
        assert_eq!(output.counts.get("EMAIL_ADDRESS"), 1);
        assert_eq!(output.counts.get("PHONE_NUMBER"), 1);
        assert!(output.report.contains("Total Email Address found: 1"));
        assert!(output.report.contains("Total Phone Number found: 1"));

        Ok(())
    }

    #[test]
    fn test_empty_input_is_malformed() {
        let err = Deidentifier::default().deidentify("").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_no_pii_grid_is_unchanged() -> Result<()> {
        let input = "city,notes\nLyon,\"quiet, green\"\nOslo,\n";
        let output = Deidentifier::default().deidentify(input)?;

        assert_eq!(parse_grid(&output.csv), parse_grid(input));
        assert!(output.counts.is_empty());

        Ok(())
    }

    #[test]
    fn test_deidentified_output_has_no_pii_left() -> Result<()> {
        let deidentifier = Deidentifier::default();
        let first = deidentifier.deidentify("name,contact\nAlice,\"alice@example.com, 415-555-0132\"\n")?;
        assert_eq!(first.counts.total(), 2);

        let second = deidentifier.deidentify(&first.csv)?;
        assert_eq!(second.csv, first.csv);
        assert!(second.counts.is_empty());
        assert!(second.report.contains(NO_PII_LINE));

        Ok(())
    }

    #[test]
    fn test_blank_lines_are_kept() -> Result<()> {
        let output = Deidentifier::default().deidentify("name\n\nbob@example.com\n\n")?;

        assert_eq!(output.csv, "name\n\nXXXXXX\n\n");
        assert_eq!(output.counts.get("EMAIL_ADDRESS"), 1);

        let blank = Deidentifier::default().deidentify("\n")?;
        assert_eq!(blank.csv, "\n");
        assert!(blank.report.contains(NO_PII_LINE));

        Ok(())
    }

    #[test]
    fn test_byte_order_mark_round_trips() -> Result<()> {
        let input = "\u{feff}name,email\n";
        let output = Deidentifier::default().deidentify(input)?;
        assert_eq!(output.csv, input);

        let output = Deidentifier::default().deidentify("\u{feff}name,email\nAlice,alice@example.com\n")?;
        assert_eq!(output.csv, "\u{feff}name,email\nAlice,XXXXXX\n");

        Ok(())
    }

    #[test]
    fn test_counts_match_masked_cells() -> Result<()> {
        let input = "a,b,c\n\
                     x@example.com,plain,y@example.org\n\
                     ,192.168.0.1,card 4111 1111 1111 1111\n";
        let output = Deidentifier::default().deidentify(input)?;
        let grid = parse_grid(&output.csv);

        assert_eq!(grid[0], vec!["a", "b", "c"]);
        assert_eq!(grid[1], vec!["XXXXXX", "plain", "XXXXXX"]);
        assert_eq!(grid[2], vec!["", "XXXXXX", "card XXXXXX"]);

        let masked = output.csv.matches("XXXXXX").count();
        assert_eq!(output.counts.total(), masked);
        assert_eq!(output.counts.get("EMAIL_ADDRESS"), 2);
        assert_eq!(output.counts.get("IP_ADDRESS"), 1);
        assert_eq!(output.counts.get("CREDIT_CARD"), 1);
        assert_eq!(output.counts.get("PHONE_NUMBER"), 0);

        for (entity_type, count) in output.counts.iter() {
            let label = csv_deidentifier::pipeline::display_label(entity_type);
            assert!(output.report.contains(&format!("Total {} found: {}", label, count)));
        }

        Ok(())
    }

    #[test]
    fn test_per_entity_operators() -> Result<()> {
        let operators = OperatorConfig::uniform(Operator::Generalize).with_entity(
            "EMAIL_ADDRESS",
            Operator::Mask {
                masking_char: '*',
                chars_to_mask: Some(5),
                from_end: false,
            },
        );
        let output = Deidentifier::default()
            .with_operators(operators)
            .deidentify("contact\nalice@example.com / 415-555-0132\n")?;

        assert_eq!(output.csv, "contact\n*****@example.com / <PHONE_NUMBER>\n");

        Ok(())
    }

    /// Counts calls and flags every occurrence of "secret"
    struct CountingDetector {
        calls: AtomicUsize,
    }

    impl EntityDetector for CountingDetector {
        fn detect(&self, text: &str, _language: &str) -> Result<Vec<DetectedEntity>, DetectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text
                .match_indices("secret")
                .map(|(start, m)| DetectedEntity::new("SECRET", start, start + m.len(), 1.0))
                .collect())
        }
    }

    #[test]
    fn test_custom_detector_sees_only_non_blank_data_cells() -> Result<()> {
        let detector = Arc::new(CountingDetector {
            calls: AtomicUsize::new(0),
        });
        let deidentifier = Deidentifier::new(detector.clone(), Arc::new(Anonymizer::new()));

        let output = deidentifier.deidentify("secret,b\nmy secret,  \n,x\n")?;

        assert_eq!(output.csv, "secret,b\nmy XXXXXX,  \n,x\n");
        assert_eq!(output.counts.get("SECRET"), 1);
        assert!(output.report.contains("Total Secret found: 1"));
        // "my secret" and "x"; header and blank cells are skipped
        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);

        Ok(())
    }

    fn word() -> impl Strategy<Value = String> {
        "[a-z]{1,8}"
    }

    fn cell() -> impl Strategy<Value = String> {
        prop_oneof![
            word(),
            word().prop_map(|w| format!("{}@example.com", w)),
            word().prop_map(|w| format!("{}, {}", w, w)),
            Just(String::new()),
        ]
    }

    fn grid() -> impl Strategy<Value = Vec<Vec<String>>> {
        (1usize..5).prop_flat_map(|columns| {
            (
                prop::collection::vec(word(), columns),
                prop::collection::vec(prop::collection::vec(cell(), columns), 0..6),
            )
                .prop_map(|(header, rows)| {
                    let mut grid = vec![header];
                    grid.extend(rows);
                    grid
                })
        })
    }

    fn render(grid: &[Vec<String>]) -> String {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        for row in grid {
            writer.write_record(row).unwrap();
        }
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    proptest! {
        #[test]
        fn prop_shape_and_header_preserved(grid in grid()) {
            let input = render(&grid);
            let output = Deidentifier::default().deidentify(&input).unwrap();
            let result = parse_grid(&output.csv);

            prop_assert_eq!(result.len(), grid.len());
            prop_assert_eq!(&result[0], &grid[0]);
            for (out_row, in_row) in result.iter().zip(grid.iter()) {
                prop_assert_eq!(out_row.len(), in_row.len());
            }

            let emails = grid[1..]
                .iter()
                .flatten()
                .filter(|c| c.contains('@'))
                .count();
            prop_assert_eq!(output.counts.get("EMAIL_ADDRESS"), emails);
            prop_assert_eq!(output.counts.total(), emails);

            let rerun = Deidentifier::default().deidentify(&output.csv).unwrap();
            prop_assert_eq!(&rerun.csv, &output.csv);
            prop_assert!(rerun.counts.is_empty());
            prop_assert!(rerun.report.contains(NO_PII_LINE));
        }
    }
}
