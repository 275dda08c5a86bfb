//! Command-line interface for the scheduling engine.
//!
//! An interactive menu over an in-memory record store for booking appointments,
//! creating recurring series, searching open slots and changing series.

use std::io::{self, Write};

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use practice_scheduler::config::{config_path_from_env, load_config, ConfigSource};
use practice_scheduler::logging::init_logging;
use practice_scheduler::{
    Appointment, AppointmentDraft, AppointmentType, ConflictPolicy, ExceptionKind, InMemoryStore,
    RecurrencePattern, RecurrenceType, Scheduler, SchedulerConfig, SchedulingError,
    SeriesBookingReport, SeriesUpdate,
};
use tracing::warn;
use uuid::Uuid;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

struct SchedulerCli {
    store: InMemoryStore,
    config: SchedulerConfig,
    running: bool,
}

impl SchedulerCli {
    fn new(config: SchedulerConfig) -> Self {
        SchedulerCli {
            store: InMemoryStore::new(),
            config,
            running: true,
        }
    }

    fn scheduler(&self) -> Scheduler<'_, InMemoryStore> {
        Scheduler::new(&self.store, self.config.clone())
    }

    fn print_header(&self) {
        println!("\n{}", "=".repeat(60));
        println!("       PRACTICE APPOINTMENT SCHEDULER");
        println!("{}", "=".repeat(60));
    }

    fn print_menu(&self) {
        println!("\n--- Main Menu ---");
        println!("1. Book appointment");
        println!("2. Create recurring series");
        println!("3. Check for conflicts");
        println!("4. Find open slots");
        println!("5. Update series from date");
        println!("6. Cancel series from date");
        println!("7. Record series exception");
        println!("8. View appointments");
        println!("9. Run demo");
        println!("0. Exit");
        println!("{}", "-".repeat(20));
    }

    /// Read one line; `None` once stdin is closed.
    fn get_input(&mut self, prompt: &str, default: Option<&str>) -> Option<String> {
        match default {
            Some(def) => print!("{} [{}]: ", prompt, def),
            None => print!("{}: ", prompt),
        }
        let _ = io::stdout().flush();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => {
                self.running = false;
                None
            }
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    Some(default.unwrap_or("").to_string())
                } else {
                    Some(input.to_string())
                }
            }
        }
    }

    fn get_int_input(&mut self, prompt: &str, default: Option<i64>) -> Option<i64> {
        loop {
            let default_str = default.map(|d| d.to_string());
            let input = self.get_input(prompt, default_str.as_deref())?;
            if let Ok(value) = input.parse::<i64>() {
                return Some(value);
            }
            println!("Please enter a valid number");
        }
    }

    fn get_datetime_input(&mut self, prompt: &str, default: NaiveDateTime) -> Option<NaiveDateTime> {
        loop {
            let default_str = default.format(DATETIME_FORMAT).to_string();
            let input = self.get_input(prompt, Some(&default_str))?;
            match NaiveDateTime::parse_from_str(&input, DATETIME_FORMAT) {
                Ok(value) => return Some(value),
                Err(_) => println!("Please use the format YYYY-MM-DD HH:MM"),
            }
        }
    }

    fn get_date_input(&mut self, prompt: &str, default: NaiveDate) -> Option<NaiveDate> {
        loop {
            let default_str = default.format(DATE_FORMAT).to_string();
            let input = self.get_input(prompt, Some(&default_str))?;
            match NaiveDate::parse_from_str(&input, DATE_FORMAT) {
                Ok(value) => return Some(value),
                Err(_) => println!("Please use the format YYYY-MM-DD"),
            }
        }
    }

    fn optional(value: String) -> Option<String> {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Ask for the fields shared by single bookings and series bases.
    fn read_draft(&mut self) -> Option<AppointmentDraft> {
        let title = self.get_input("Title", Some("Consultation"))?;
        let contact_id = self.get_input("Patient ID", None)?;
        let type_input = self.get_input("Type", Some(AppointmentType::Consultation.as_str()))?;
        let start = self.get_datetime_input("Start", next_working_day(9))?;
        let default_minutes = self.config.series.default_duration_minutes;
        let minutes = self.get_int_input("Duration (minutes)", Some(default_minutes))?;
        let location = self.get_input("Location (optional)", Some(""))?;

        let appointment_type = match type_input.parse::<AppointmentType>() {
            Ok(value) => value,
            Err(e) => {
                println!("\n{}", e.user_message());
                return None;
            }
        };

        let end = match end_after(start, minutes) {
            Ok(end) => end,
            Err(e) => {
                println!("\n{}", e.user_message());
                return None;
            }
        };

        match AppointmentDraft::new(title, contact_id, start, end) {
            Ok(draft) => {
                let draft = draft.with_type(appointment_type);
                Some(match Self::optional(location) {
                    Some(location) => draft.with_location(location),
                    None => draft,
                })
            }
            Err(e) => {
                println!("\n{}", e.user_message());
                None
            }
        }
    }

    fn book_appointment(&mut self) {
        println!("\n--- Book Appointment ---");
        let Some(draft) = self.read_draft() else {
            return;
        };

        match self.scheduler().book(draft) {
            Ok(appointment) => {
                println!("\nBooked {}", describe(&appointment));
            }
            Err(e) => println!("\nCould not book: {}", e.user_message()),
        }
    }

    fn create_series(&mut self) {
        println!("\n--- Create Recurring Series ---");
        let Some(base) = self.read_draft() else {
            return;
        };
        let Some(pattern) = self.read_pattern() else {
            return;
        };
        let default_count = self.config.series.default_length as i64;
        let Some(count) = self.get_int_input("Number of instances", Some(default_count)) else {
            return;
        };
        let Some(skip) = self.get_input("Skip conflicting instances? (y/n)", Some("y")) else {
            return;
        };
        let policy = if skip.eq_ignore_ascii_case("n") {
            ConflictPolicy::Ignore
        } else {
            ConflictPolicy::Skip
        };

        let count = count.max(0) as usize;
        match self.scheduler().schedule_series(&base, &pattern, count, policy) {
            Ok(report) => print_report(&report),
            Err(e) => println!("\nCould not create series: {}", e.user_message()),
        }
    }

    fn read_pattern(&mut self) -> Option<RecurrencePattern> {
        println!("\nRecurrence: daily, weekly, monthly or yearly");
        let kind = self.get_input("Repeat", Some("weekly"))?;
        let interval = self.get_int_input("Every N units", Some(1))?;

        let recurrence_type = match kind.parse::<RecurrenceType>() {
            Ok(value) => value,
            Err(e) => {
                println!("\n{}", e.user_message());
                return None;
            }
        };
        let mut pattern = RecurrencePattern::new(recurrence_type, interval.clamp(0, u32::MAX as i64) as u32);

        match recurrence_type {
            RecurrenceType::Weekly => {
                let days = self.get_input("Weekdays, 0=Sun..6=Sat, comma separated (optional)", Some(""))?;
                let parsed: Result<Vec<u8>, _> = days
                    .split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::parse::<u8>)
                    .collect();
                match parsed {
                    Ok(days) => pattern = pattern.on_days(days),
                    Err(_) => {
                        println!("\nWeekdays must be numbers between 0 and 6");
                        return None;
                    }
                }
            }
            RecurrenceType::Monthly => {
                let day = self.get_int_input("Day of month (0 to keep the start day)", Some(0))?;
                if day > 0 {
                    pattern = pattern.on_day_of_month(day.min(i64::from(u32::MAX)) as u32);
                }
            }
            RecurrenceType::Daily | RecurrenceType::Yearly => {}
        }

        let until = self.get_input("End date YYYY-MM-DD (optional)", Some(""))?;
        if let Some(until) = Self::optional(until) {
            match NaiveDate::parse_from_str(&until, DATE_FORMAT) {
                Ok(date) => {
                    if let Some(end_of_day) = date.and_hms_opt(23, 59, 59) {
                        pattern = pattern.until(end_of_day);
                    }
                }
                Err(_) => {
                    println!("\nEnd date must use the format YYYY-MM-DD");
                    return None;
                }
            }
        }

        match pattern.validate() {
            Ok(()) => Some(pattern),
            Err(e) => {
                println!("\n{}", e.user_message());
                None
            }
        }
    }

    fn check_conflicts(&mut self) {
        println!("\n--- Check For Conflicts ---");
        let Some(start) = self.get_datetime_input("Start", next_working_day(10)) else {
            return;
        };
        let Some(minutes) = self.get_int_input("Duration (minutes)", Some(60)) else {
            return;
        };

        let end = match end_after(start, minutes) {
            Ok(end) => end,
            Err(e) => {
                println!("\n{}", e.user_message());
                return;
            }
        };

        match self.scheduler().conflicts(start, end, None) {
            Ok(conflicts) if conflicts.is_empty() => println!("\nNo conflicts, the time is free"),
            Ok(conflicts) => {
                println!("\nConflicts with {} appointment(s):", conflicts.len());
                for appointment in &conflicts {
                    println!("  - {}", describe(appointment));
                }
            }
            Err(e) => println!("\n{}", e.user_message()),
        }
    }

    fn find_open_slots(&mut self) {
        println!("\n--- Find Open Slots ---");
        let Some(date) = self.get_date_input("Date", next_working_day(9).date()) else {
            return;
        };
        let default_minutes = self.config.series.default_duration_minutes;
        let Some(minutes) = self.get_int_input("Duration (minutes)", Some(default_minutes)) else {
            return;
        };

        match self.scheduler().find_open_slots(date, minutes) {
            Ok(slots) if slots.is_empty() => println!("\nNo open slots on {}", date),
            Ok(slots) => {
                println!("\n{}:", date.format("%A, %Y-%m-%d"));
                for slot in &slots {
                    println!("  {} - {}", slot.start.format("%H:%M"), slot.end.format("%H:%M"));
                }
            }
            Err(e) => println!("\n{}", e.user_message()),
        }
    }

    /// List known series and let the user pick one.
    fn choose_series(&mut self) -> Option<Uuid> {
        let appointments = match self.store.appointments() {
            Ok(appointments) => appointments,
            Err(e) => {
                println!("\n{}", SchedulingError::from(e).user_message());
                return None;
            }
        };

        let mut series: Vec<(Uuid, String, NaiveDateTime)> = Vec::new();
        for appointment in &appointments {
            if let Some(series_id) = appointment.series_id {
                if !series.iter().any(|(id, _, _)| *id == series_id) {
                    series.push((series_id, appointment.title.clone(), appointment.start_time));
                }
            }
        }

        if series.is_empty() {
            println!("\nNo recurring series yet (option 2)");
            return None;
        }

        println!("\nSeries:");
        for (i, (id, title, first)) in series.iter().enumerate() {
            println!(
                "  {}. {} from {} ({}...)",
                i + 1,
                title,
                first.format(DATETIME_FORMAT),
                &id.to_string()[..8]
            );
        }

        let choice = self.get_int_input("Select series (0 to go back)", Some(0))?;
        if choice <= 0 || choice as usize > series.len() {
            return None;
        }
        Some(series[choice as usize - 1].0)
    }

    fn update_series(&mut self) {
        println!("\n--- Update Series From Date ---");
        let Some(series_id) = self.choose_series() else {
            return;
        };
        let Some(from) = self.get_datetime_input("Apply from", next_working_day(0)) else {
            return;
        };
        let Some(title) = self.get_input("New title (optional)", Some("")) else {
            return;
        };
        let Some(location) = self.get_input("New location (optional)", Some("")) else {
            return;
        };
        let Some(notes) = self.get_input("New notes (optional)", Some("")) else {
            return;
        };

        let update = SeriesUpdate {
            title: Self::optional(title),
            location: Self::optional(location),
            notes: Self::optional(notes),
            ..Default::default()
        };

        match self.scheduler().update_from_date(series_id, from, &update) {
            Ok(count) => println!("\nUpdated {} instance(s)", count),
            Err(e) => println!("\nCould not update series: {}", e.user_message()),
        }
    }

    fn cancel_series(&mut self) {
        println!("\n--- Cancel Series From Date ---");
        let Some(series_id) = self.choose_series() else {
            return;
        };
        let Some(from) = self.get_datetime_input("Cancel from", next_working_day(0)) else {
            return;
        };
        let Some(reason) = self.get_input("Reason (optional)", Some("")) else {
            return;
        };

        match self
            .scheduler()
            .cancel_from_date(series_id, from, Self::optional(reason))
        {
            Ok(count) => println!("\nCancelled {} instance(s)", count),
            Err(e) => println!("\nCould not cancel series: {}", e.user_message()),
        }
    }

    fn record_exception(&mut self) {
        println!("\n--- Record Series Exception ---");
        let Some(series_id) = self.choose_series() else {
            return;
        };
        let instances = match self.store.series(series_id) {
            Ok(instances) => instances,
            Err(e) => {
                println!("\n{}", SchedulingError::from(e).user_message());
                return;
            }
        };

        println!("\nInstances:");
        for (i, appointment) in instances.iter().enumerate() {
            println!("  {}. {}", i + 1, describe(appointment));
        }
        let Some(choice) = self.get_int_input("Select instance (0 to go back)", Some(0)) else {
            return;
        };
        if choice <= 0 || choice as usize > instances.len() {
            return;
        }
        let instance = &instances[choice as usize - 1];

        println!("\n  1. Cancel this instance");
        println!("  2. Reschedule this instance");
        let Some(kind_choice) = self.get_int_input("Exception type", Some(1)) else {
            return;
        };
        let kind = match kind_choice {
            2 => {
                let Some(new_start) = self.get_datetime_input("New start", instance.start_time) else {
                    return;
                };
                ExceptionKind::Rescheduled {
                    new_start,
                    new_end: new_start + instance.duration(),
                }
            }
            _ => ExceptionKind::Cancelled,
        };
        let Some(reason) = self.get_input("Reason (optional)", Some("")) else {
            return;
        };

        match self
            .scheduler()
            .create_exception(series_id, instance.start_time, kind, Self::optional(reason))
        {
            Ok(outcome) => println!(
                "\nRecorded {} exception; instance is now {}",
                outcome.exception.exception_type,
                describe(&outcome.appointment)
            ),
            Err(e) => println!("\nCould not record exception: {}", e.user_message()),
        }
    }

    fn view_appointments(&self) {
        let appointments = match self.store.appointments() {
            Ok(appointments) => appointments,
            Err(e) => {
                println!("\n{}", SchedulingError::from(e).user_message());
                return;
            }
        };

        if appointments.is_empty() {
            println!("\nNo appointments");
            return;
        }

        println!("\n--- Appointments ({}) ---", appointments.len());
        let mut current_date = None;
        for appointment in &appointments {
            let date = appointment.start_time.date();
            if Some(date) != current_date {
                current_date = Some(date);
                println!("\n{}:", date.format("%A, %Y-%m-%d"));
            }
            println!(
                "  {} - {} {} [{}] ({}){}",
                appointment.start_time.format("%H:%M"),
                appointment.end_time.format("%H:%M"),
                appointment.title,
                appointment.status,
                appointment.contact_id,
                if appointment.series_id.is_some() { " *series" } else { "" }
            );
        }
    }

    fn run_demo(&mut self) {
        println!("\n--- Running Demo ---");
        let scheduler = self.scheduler();
        let today = Local::now().date_naive();
        let days_ahead = 7 - i64::from(today.weekday().num_days_from_monday());
        let monday = (today + Duration::days(days_ahead)).and_time(NaiveTime::MIN) + Duration::hours(9);

        let base = match AppointmentDraft::new("Physiotherapy", "P042", monday, monday + Duration::hours(1)) {
            Ok(draft) => draft.with_type(AppointmentType::Therapy).with_location("Room 2"),
            Err(e) => {
                println!("Demo setup failed: {}", e.user_message());
                return;
            }
        };
        let pattern = RecurrencePattern::weekly(1).on_days([1, 3]);

        println!(
            "Physiotherapy every Monday and Wednesday from {}, 6 sessions",
            monday.format(DATETIME_FORMAT)
        );

        let wednesday = monday + Duration::days(2);
        if let Ok(draft) = AppointmentDraft::new("Dental check", "P007", wednesday, wednesday + Duration::minutes(30)) {
            match scheduler.book(draft) {
                Ok(appointment) => println!("Existing booking: {}", describe(&appointment)),
                Err(e) => warn!(error = %e, "demo booking failed"),
            }
        }

        let report = match scheduler.schedule_series(&base, &pattern, 6, ConflictPolicy::Skip) {
            Ok(report) => report,
            Err(e) => {
                println!("Demo series failed: {}", e.user_message());
                return;
            }
        };
        print_report(&report);

        match scheduler.find_open_slots(monday.date(), 60) {
            Ok(slots) => {
                println!("\nOpen hourly slots on {}:", monday.date().format("%A %Y-%m-%d"));
                let times: Vec<String> = slots.iter().map(|s| s.start.format("%H:%M").to_string()).collect();
                println!("  {}", times.join(", "));
            }
            Err(e) => println!("{}", e.user_message()),
        }

        let Some(series_id) = report.series_id() else {
            return;
        };
        if let Some(second) = report.created.get(1) {
            match scheduler.create_exception(
                series_id,
                second.start_time,
                ExceptionKind::Cancelled,
                Some("Patient travelling".to_string()),
            ) {
                Ok(outcome) => println!("\nException: {}", describe(&outcome.appointment)),
                Err(e) => println!("{}", e.user_message()),
            }
        }
        if let Some(fourth) = report.created.get(3) {
            match scheduler.cancel_from_date(series_id, fourth.start_time, Some("Course finished early".to_string())) {
                Ok(count) => println!(
                    "Cancelled {} session(s) from {}",
                    count,
                    fourth.start_time.format(DATETIME_FORMAT)
                ),
                Err(e) => println!("{}", e.user_message()),
            }
        }

        println!("\nNote: the session clashing with the dental check was skipped,");
        println!("and everything before the cancellation date was left as booked.");
    }

    fn run(&mut self) {
        self.print_header();

        while self.running {
            self.print_menu();

            let Some(choice) = self.get_int_input("Enter choice", Some(9)) else {
                break;
            };

            match choice {
                1 => self.book_appointment(),
                2 => self.create_series(),
                3 => self.check_conflicts(),
                4 => self.find_open_slots(),
                5 => self.update_series(),
                6 => self.cancel_series(),
                7 => self.record_exception(),
                8 => self.view_appointments(),
                9 => self.run_demo(),
                0 => {
                    self.running = false;
                    println!("\nGoodbye!");
                }
                _ => println!("Invalid choice"),
            }
        }
    }
}

/// The next weekday (Mon-Fri) after today at `hour`:00.
fn next_working_day(hour: u32) -> NaiveDateTime {
    let mut date = Local::now().date_naive() + Duration::days(1);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date += Duration::days(1);
    }
    date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour))
}

/// End of an appointment lasting `minutes` from `start`, rejecting out-of-range input.
fn end_after(start: NaiveDateTime, minutes: i64) -> Result<NaiveDateTime, SchedulingError> {
    let duration =
        Duration::try_minutes(minutes).ok_or(SchedulingError::InvalidSlotDuration(minutes))?;
    start
        .checked_add_signed(duration)
        .ok_or(SchedulingError::DateOutOfRange)
}

fn describe(appointment: &Appointment) -> String {
    format!(
        "{} {} - {} ({}, {})",
        appointment.title,
        appointment.start_time.format(DATETIME_FORMAT),
        appointment.end_time.format("%H:%M"),
        appointment.contact_id,
        appointment.status
    )
}

fn print_report(report: &SeriesBookingReport) {
    println!("\n--- Series Results ---");
    println!("  Requested: {}", report.total_requested);
    println!("  Created: {}", report.created.len());
    println!("  Skipped (conflicts): {}", report.skipped.len());
    println!("  Failed: {}", report.failed.len());
    println!("  Success rate: {:.1}%", report.success_rate());

    for appointment in &report.created {
        println!("  + {}", describe(appointment));
    }
    for draft in &report.skipped {
        println!("  ~ skipped {}", draft.start_time.format(DATETIME_FORMAT));
    }
    for failed in &report.failed {
        println!(
            "  ! {}: {}",
            failed.draft.start_time.format(DATETIME_FORMAT),
            failed.error.user_message()
        );
    }
    if !report.is_complete() {
        println!("  Series is incomplete; created instances were kept.");
    }
}

fn main() {
    let config_path = config_path_from_env();
    let (config, config_error) = match load_config(config_path.as_deref()) {
        Ok(loaded) => {
            if loaded.source == ConfigSource::Default && config_path.is_some() {
                println!("Configuration file not found, using defaults");
            }
            (loaded.config, None)
        }
        Err(e) => (SchedulerConfig::default(), Some(e)),
    };

    if let Err(e) = init_logging(&config.logging.filter) {
        eprintln!("Logging disabled: {}", e);
    }
    if let Some(e) = config_error {
        warn!(error = %e, "falling back to default configuration");
    }

    let mut cli = SchedulerCli::new(config);
    cli.run();
}
