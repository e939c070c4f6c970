//! Initial population.

use clawinn_core::{
    Agent, AgentRole, Clock, MarketStore, PopulationConfig, SimRng, Task,
};
use tracing::info;

use crate::error::SimError;

const NAMES: &[&str] = &[
    "Arclight", "Bastion", "Cinder", "Drift", "Ember", "Fathom", "Glyph", "Halcyon", "Ion",
    "Jolt", "Kestrel", "Lumen", "Mosaic", "Nimbus", "Onyx", "Pylon", "Quill", "Rune", "Sable",
    "Tessel", "Umbra", "Vesper", "Warden", "Xeno", "Yarrow", "Zephyr", "Atlas", "Beacon",
    "Cobalt", "Dynamo", "Echo", "Flint", "Garnet", "Helix", "Indigo", "Juniper", "Karma",
    "Lattice", "Meridian", "Nova", "Orbit", "Prism", "Quartz", "Relay", "Sprocket", "Tundra",
    "Unity", "Vector", "Whisper", "Axiom",
];

const SKILLS: &[&str] = &[
    "Smart Contract Auditing",
    "Security Auditing",
    "Solana Program Dev",
    "Rust Development",
    "DeFi Protocol Design",
    "Token Economics",
    "TypeScript/React",
    "API Integration",
    "Data Analysis",
    "Machine Learning",
    "Frontend Design",
    "Backend Architecture",
    "DevOps/CI-CD",
    "Technical Writing",
    "Community Management",
    "Trading Bot Dev",
    "Blockchain Analytics",
    "Wallet Integration",
    "UX Research",
    "Quality Assurance",
];

const SPECIALIZATIONS: &[&str] = &[
    "Smart Contracts",
    "DeFi",
    "Infrastructure",
    "Security",
    "Frontend",
    "Backend",
    "Full Stack",
    "Data Science",
    "DevOps",
    "Trading",
    "Analytics",
    "Documentation",
    "Community",
    "Research",
];

const TASK_TITLES: &[&str] = &[
    "Review the {spec} backlog",
    "Ship a {spec} prototype",
    "Audit last quarter's {spec} work",
    "Write a {spec} runbook",
    "Fix the flaky {spec} pipeline",
    "Scope the next {spec} milestone",
];

fn pick<'a>(rng: &SimRng, pool: &[&'a str]) -> &'a str {
    rng.index(pool.len()).map_or("", |i| pool[i])
}

/// Unique display name for the `n`th agent.
fn agent_name(n: usize) -> String {
    let base = NAMES[n % NAMES.len()];
    match n / NAMES.len() {
        0 => base.to_string(),
        round => format!("{base}{}", round + 1),
    }
}

fn random_skills(rng: &SimRng) -> Vec<&'static str> {
    let count = rng.between(1, 4) as usize;
    let mut skills = Vec::with_capacity(count);
    while skills.len() < count {
        let skill = pick(rng, SKILLS);
        if !skills.contains(&skill) {
            skills.push(skill);
        }
    }
    skills
}

/// Populate an empty store with employers, workers and open tasks.
///
/// Returns the number of agents created.
pub async fn seed_marketplace<S: MarketStore>(
    store: &S,
    population: &PopulationConfig,
    rng: &SimRng,
    clock: &dyn Clock,
) -> Result<usize, SimError> {
    let now = clock.now();
    let roles = std::iter::repeat_n(AgentRole::Employer, population.employers as usize)
        .chain(std::iter::repeat_n(AgentRole::Worker, population.workers as usize));

    let mut created = 0;
    let mut tasks = 0;
    for (n, role) in roles.enumerate() {
        let balance = match role {
            AgentRole::Employer => population.employer_starting_balance,
            AgentRole::Worker => population.worker_starting_balance,
        };
        let specialization = pick(rng, SPECIALIZATIONS);
        let agent = Agent::new(rng.uuid(), agent_name(n), role, balance, now)
            .with_skills(random_skills(rng))
            .with_specialization(specialization);
        let employer_id = agent.id;
        store.insert_agent(agent).await?;
        created += 1;

        if role == AgentRole::Employer {
            for _ in 0..population.tasks_per_employer {
                let title = pick(rng, TASK_TITLES).replace("{spec}", specialization);
                store
                    .insert_task(Task::open(rng.uuid(), employer_id, title, now))
                    .await?;
                tasks += 1;
            }
        }
    }

    info!(
        agents = created,
        employers = population.employers,
        workers = population.workers,
        tasks,
        "marketplace seeded"
    );
    Ok(created)
}
