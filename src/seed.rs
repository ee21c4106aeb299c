// src/seed.rs
//
// Hand-seeded reference data: learning paths, topics, and the question bank.
// Inserted once on startup when the tables are empty.

use sqlx::SqlitePool;

/// (id, name, description)
const PATHS: &[(&str, &str, &str)] = &[
    (
        "path-ai",
        "AI & Data Science",
        "Neural networks and predictive modeling.",
    ),
    (
        "path-aero",
        "Aerospace Engineering",
        "Orbital mechanics and propulsion systems.",
    ),
    (
        "path-elec",
        "Electrical Engineering",
        "Circuit analysis and digital logic.",
    ),
    (
        "path-mech",
        "Mechanical Engineering",
        "Thermodynamics and material science.",
    ),
    (
        "path-civil",
        "Civil Engineering",
        "Structural mechanics and urban planning.",
    ),
];

/// (id, path_id, name, description, exam focus tags)
const TOPICS: &[(&str, &str, &str, &str, &[&str])] = &[
    (
        "alg-01",
        "path-ai",
        "Advanced Algebra",
        "Linear equations for AI systems.",
        &["MU", "GATE"],
    ),
    (
        "ml-01",
        "path-ai",
        "Machine Learning Basics",
        "Training your first model.",
        &["GATE"],
    ),
    (
        "aero-01",
        "path-aero",
        "Fluid Dynamics",
        "Lift and drag coefficients.",
        &["GATE", "ISRO"],
    ),
    (
        "elec-01",
        "path-elec",
        "Circuit Theory",
        "KVL, KCL, and nodal analysis.",
        &["MU", "ESE"],
    ),
    (
        "mech-01",
        "path-mech",
        "Thermodynamics",
        "Entropy and heat cycles.",
        &["GATE", "ESE"],
    ),
    (
        "civil-01",
        "path-civil",
        "Structural Analysis",
        "Stress and strain in trusses.",
        &["MU", "ESE"],
    ),
];

/// (topic_id, content, options, index of the correct option)
const QUESTIONS: &[(&str, &str, [&str; 4], i64)] = &[
    (
        "alg-01",
        "Solve for x: 5x + 15 = 40",
        ["5", "2", "3", "7"],
        0,
    ),
    (
        "alg-01",
        "What is the determinant of the 2x2 identity matrix?",
        ["0", "1", "2", "-1"],
        1,
    ),
    (
        "alg-01",
        "Which operation leaves a matrix's rank unchanged?",
        ["Row swap", "Zeroing a row", "Dropping a column", "Squaring entries"],
        0,
    ),
    (
        "ml-01",
        "Which dataset split is used to tune hyperparameters?",
        ["Training", "Validation", "Test", "Production"],
        1,
    ),
    (
        "ml-01",
        "Gradient descent minimizes which quantity?",
        ["Accuracy", "Learning rate", "Loss function", "Batch size"],
        2,
    ),
    (
        "ml-01",
        "Overfitting shows up as low training error and what?",
        ["Low test error", "High test error", "High training error", "Zero variance"],
        1,
    ),
    (
        "aero-01",
        "Which principle explains lift?",
        ["Bernoulli", "Newton", "Pascal", "Faraday"],
        0,
    ),
    (
        "aero-01",
        "The drag coefficient is dimensionless because it is normalized by what?",
        ["Wing mass", "Dynamic pressure and area", "Air temperature", "Flight time"],
        1,
    ),
    (
        "aero-01",
        "Laminar flow transitions to turbulent above a critical value of which number?",
        ["Mach", "Froude", "Reynolds", "Prandtl"],
        2,
    ),
    (
        "elec-01",
        "What is the unit of impedance?",
        ["Henry", "Farad", "Ohm", "Watt"],
        2,
    ),
    (
        "elec-01",
        "Kirchhoff's current law is a statement of conservation of what?",
        ["Energy", "Charge", "Momentum", "Flux"],
        1,
    ),
    (
        "elec-01",
        "Two 10-ohm resistors in parallel give what equivalent resistance?",
        ["20 ohms", "10 ohms", "5 ohms", "2.5 ohms"],
        2,
    ),
    (
        "mech-01",
        "Entropy of an isolated system can never do what?",
        ["Increase", "Decrease", "Stay constant", "Fluctuate"],
        1,
    ),
    (
        "mech-01",
        "Which cycle is the theoretical upper bound on heat-engine efficiency?",
        ["Otto", "Rankine", "Carnot", "Brayton"],
        2,
    ),
    (
        "mech-01",
        "An adiabatic process exchanges no what with its surroundings?",
        ["Work", "Heat", "Mass", "Volume"],
        1,
    ),
    (
        "civil-01",
        "A two-force truss member carries load along which direction?",
        ["Its axis", "Perpendicular to its axis", "Any direction", "The vertical"],
        0,
    ),
    (
        "civil-01",
        "Hooke's law relates stress to what?",
        ["Temperature", "Strain", "Time", "Density"],
        1,
    ),
    (
        "civil-01",
        "A simply supported beam has how many reaction components?",
        ["Two", "Three", "Four", "Six"],
        1,
    ),
];

/// Seeds paths, topics, and questions when the reference tables are empty.
pub async fn seed_reference_data(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM learning_paths")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    tracing::info!("Seeding reference data...");

    for (id, name, description) in PATHS {
        sqlx::query("INSERT INTO learning_paths (id, name, description) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(name)
            .bind(description)
            .execute(pool)
            .await?;
    }

    for (id, path_id, name, description, exam_focus) in TOPICS {
        let tags = serde_json::to_string(exam_focus).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            r#"
            INSERT INTO topics (id, path_id, name, description, exam_focus)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(id)
        .bind(path_id)
        .bind(name)
        .bind(description)
        .bind(tags)
        .execute(pool)
        .await?;
    }

    for (topic_id, content, options, correct_answer) in QUESTIONS {
        let options = serde_json::to_string(options).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            r#"
            INSERT INTO questions (topic_id, content, options, correct_answer)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(topic_id)
        .bind(content)
        .bind(options)
        .bind(correct_answer)
        .execute(pool)
        .await?;
    }

    tracing::info!(
        "Seeded {} paths, {} topics, {} questions.",
        PATHS.len(),
        TOPICS.len(),
        QUESTIONS.len()
    );
    Ok(())
}
