use build_order_catalog::Catalog;
use build_order_core::{BuildPlan, Location};
use build_order_system_plan_grammar::{
    parse, parse_compact, parse_verbose, to_long_text, to_short_text, PlanError,
};

fn catalog() -> Catalog {
    Catalog::builtin().expect("builtin catalog loads")
}

/// Parses semicolon separated lines so cases stay on one line.
fn parse_lines(text: &str) -> Result<BuildPlan, PlanError> {
    parse_verbose(&text.replace(';', "\n"), &catalog())
}

fn valid(text: &str) -> BuildPlan {
    let plan = parse_lines(text).expect("plan has a valid header");
    assert!(plan.is_valid(), "{:?}", plan.diagnostics());
    plan
}

fn first_error(text: &str) -> String {
    let plan = parse_lines(text).expect("plan has a valid header");
    let first = plan.errors().next().map(ToString::to_string);
    first.expect("plan has an error")
}

fn short_codes(plan: &BuildPlan) -> Vec<String> {
    plan.steps()
        .iter()
        .map(|step| step.action.short_code())
        .collect()
}

#[test]
fn trivial_plan_matches_its_compact_form() {
    let plan = valid("L1;A8 Barr;B5 Arti;A9 Barr;D1 Mage;E3 Mage");
    assert_eq!(plan.steps().len(), 5);
    assert_eq!(to_short_text(&plan), "L1:A8pB5tA9pD1sE3s");
}

#[test]
fn omitted_upgrade_level_is_one_above_current() {
    let plan = valid("L1;A8 Tesl;A8 Over;A8 Over;A8 Over");
    assert_eq!(short_codes(&plan), ["t5", "y1", "y2", "y3"]);
}

#[test]
fn letter_case_does_not_matter() {
    let text = "L1;A8 Barr;B5 Arti;A9 Barr;D1 Mage;E3 Mage";
    let expected = to_short_text(&valid(text));
    assert_eq!(to_short_text(&valid(&text.to_uppercase())), expected);
    assert_eq!(to_short_text(&valid(&text.to_lowercase())), expected);
}

#[test]
fn comments_and_blank_lines_are_ignored() {
    let plan = valid("# Southport;L1;;A8 Tesl;# This'll get 'em;A8 Over3;");
    assert_eq!(short_codes(&plan), ["t5", "y3"]);
}

#[test]
fn header_problems_abort_parsing() {
    let cases = [
        ("A1 Barr2", "Plan didn't start with map (ex: 'L26')."),
        ("L;", "Line 1: Unknown map name L."),
        ("L0;A1 Barr2", "Line 1: Unknown map name L0."),
        ("# only a comment", "Plan didn't start with map (ex: 'L26')."),
    ];
    for (text, message) in cases {
        let error = parse_lines(text).expect_err("header rejected");
        assert_eq!(error.to_string(), message, "{text}");
    }
}

#[test]
fn unknown_map_reports_its_line() {
    let error = parse_lines("# plan;L99;A8 Barr").expect_err("unknown map");
    assert_eq!(
        error,
        PlanError::UnknownMap {
            location: Location::Line(2),
            name: "L99".to_owned(),
        }
    );
}

#[test]
fn line_errors_name_the_line() {
    let cases = [
        ("L1;A1 Barr2", "Line 2: Unknown position 'A1' on L1."),
        ("L1;Barr2", "Line 2: Did not have a position and action."),
        ("L1;A8", "Line 2: Did not have a position and action."),
        ("L1;A8 Barr extra", "Line 2: Did not have a position and action."),
        ("L1;A8 BBQ", "Line 2: Unknown action 'bbq' at A8 on L1."),
        ("L1;A8 Over0", "Line 2: Unknown action 'over0' at A8 on L1."),
    ];
    for (text, message) in cases {
        assert_eq!(first_error(text), message, "{text}");
    }
}

#[test]
fn rule_violations_name_the_line() {
    let cases = [
        ("L1;A8 Barr;A8 Mage2", "Line 3: Can't build Mage2 on Barr at A8."),
        (
            "L1;A8 Barr3;A8 Barr3",
            "Line 3: Tower downgrade Barr3 on Barr3 at A8.",
        ),
        ("L1;A8 Poly", "Line 2: Upgrade 'Poly' on nothing at A8."),
        (
            "L1;A8 Arca;A8 Poly",
            "Line 3: There is no 'Poly' upgrade for Arca at A8.",
        ),
        (
            "L1;A8 Tesl;A8 Supe3",
            "Line 3: Ability upgrade to level 3 when 'Supe' max level is 2 at A8.",
        ),
        (
            "L1;A8 Tesl;A8 Over3;A8 Over2",
            "Line 4: Ability downgrade from 'Over3' to 'Over2' at A8.",
        ),
    ];
    for (text, message) in cases {
        assert_eq!(first_error(text), message, "{text}");
    }
}

#[test]
fn errors_accumulate_and_parsing_continues() {
    let plan = parse_lines("L1;A1 Barr;A8 Barr;A8 Mage2;A8 Barr2").expect("valid header");
    assert_eq!(plan.errors().count(), 2);
    assert_eq!(short_codes(&plan), ["p1", "p2"]);
}

#[test]
fn long_text_re_parses_to_the_same_plan() {
    let catalog = catalog();
    let compact = parse_compact("L1:A8t5yyyx2B5pp4z", &catalog).expect("valid header");
    assert!(compact.is_valid(), "{:?}", compact.diagnostics());

    let long = to_long_text(&compact, &catalog);
    assert_eq!(
        long,
        "L1\r\n\r\nA8 Tesl\r\nA8 Over1\r\nA8 Over2\r\nA8 Over3\r\nA8 Supe2\r\nB5 Barr\r\nB5 Holy\r\nB5 Shie1"
    );

    let reparsed = parse(&long, &catalog).expect("long text parses");
    assert_eq!(reparsed, compact);
}
