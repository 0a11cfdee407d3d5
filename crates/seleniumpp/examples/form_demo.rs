//! Form Demo - filling a sign-up form against the in-memory driver
//!
//! Walks through the lookups and actions a form-filling script uses, on a
//! page whose submit button only becomes clickable after a delay and whose
//! payment field lives inside an iframe.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=seleniumpp=debug cargo run --example form_demo -p seleniumpp
//! ```

#![allow(clippy::uninlined_format_args, clippy::unwrap_used)]

use chrono::NaiveDate;
use seleniumpp::mock::{MockDriver, MockElement, MockPage, Mutation};
use seleniumpp::prelude::*;
use std::time::Duration;

fn signup_page() -> MockPage {
    MockPage::new()
        .with(
            MockElement::new("form")
                .attr("id", "signup")
                .child(
                    MockElement::new("input")
                        .attr("id", "email")
                        .attr("name", "user_email")
                        .attr("placeholder", "Email address"),
                )
                .child(
                    MockElement::new("input")
                        .attr("id", "birthday")
                        .attr("name", "birth_date")
                        .attr("type", "date"),
                )
                .child(
                    MockElement::new("select")
                        .attr("id", "newsletter")
                        .attr("name", "newsletter")
                        .option("1", "Yes")
                        .option("0", "No"),
                )
                .child(
                    MockElement::new("select")
                        .attr("id", "plan")
                        .attr("name", "plan")
                        .option("free", "Free")
                        .option("team", "Team"),
                )
                .child(
                    MockElement::new("button")
                        .attr("id", "create")
                        .text("Create account")
                        .disabled(),
                ),
        )
        .with(
            MockElement::new("iframe").attr("id", "billing").frame(
                MockPage::new().with(
                    MockElement::new("input")
                        .attr("id", "card")
                        .attr("name", "card_number"),
                ),
            ),
        )
}

fn main() -> SeleniumResult<()> {
    seleniumpp::logging::init_with("seleniumpp=info", seleniumpp::logging::LogFormat::Text)?;

    println!("=== Seleniumpp Form Demo ===\n");

    let config = EngineConfig::from_yaml_str(
        "timeout_ms: 2000\npoll_interval_ms: 25\nframe_timeout_ms: 500\nretry_delay_ms: 10\n",
    )?;
    let mut driver = MockDriver::new(signup_page());
    driver.schedule(Duration::from_millis(200), Mutation::Enable("create".into()));
    let mut session = Session::with_config(driver, config)?;

    // Demo 1: locators
    println!("--- Demo 1: Locators ---\n");
    let by_attr = build_xpath("input", "name", "email", MatchMode::Fuzzy)?;
    println!("fuzzy attribute: {}", by_attr);
    let label = button_label("Create account", MatchMode::Exact, ButtonUnion::default())?;
    println!("button label:    {}\n", label);

    // Demo 2: fields
    println!("--- Demo 2: Fields ---\n");
    session.fill_input_by_attribute("name", "email", "ada@example.com", LookupOptions::fuzzy())?;
    let birthday = NaiveDate::from_ymd_opt(1815, 12, 10).unwrap();
    session.fill_date_input("name", "birth_date", birthday, LookupOptions::exact())?;
    session.fill_boolean_select("name", "newsletter", false, LookupOptions::exact())?;
    session.fill_select_by_value("name", "plan", "team", LookupOptions::exact())?;
    println!("email:      {:?}", session.driver().value_of("email"));
    println!("birthday:   {:?}", session.driver().value_of("birthday"));
    println!("newsletter: {:?}", session.driver().selected_text("newsletter"));
    println!("plan:       {:?}\n", session.driver().selected_text("plan"));

    // Demo 3: frame fallback
    println!("--- Demo 3: Frame Fallback ---\n");
    session.fill_input_by_attribute("name", "card_number", "4242 4242", LookupOptions::exact())?;
    println!("card (inside iframe): {:?}\n", session.driver().value_of("card"));

    // Demo 4: waiting for a clickable button
    println!("--- Demo 4: Clickable Wait ---\n");
    session.click_button_by_label("Create account", LookupOptions::exact())?;
    println!("create clicked {} time(s)", session.driver().click_count("create"));

    // Demo 5: a lookup that cannot succeed
    println!("\n--- Demo 5: Errors ---\n");
    let err = session
        .get_button_by_label("Delete account", LookupOptions::exact().with_timeout(100))
        .unwrap_err();
    println!("{} ({})", err, err.kind());

    println!("\n=== Form Demo Complete ===");
    Ok(())
}
