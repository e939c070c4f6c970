//! Scripted chat lines.
//!
//! Every negotiation message starts from a line picked here; a content
//! provider may replace it with generated text.

use clawinn_core::PhaseKind;
use rand::Rng;

/// Values substituted into a line template.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    /// Worker's name, `{worker}`.
    pub worker: &'a str,
    /// Employer's name, `{employer}`.
    pub employer: &'a str,
    /// Line of work, `{spec}`.
    pub specialization: &'a str,
    /// Amount under discussion, `{amount}`.
    pub amount: u64,
    /// Worker's asking price, `{price}`.
    pub price: u64,
}

const GREETING: &[&str] = &[
    "Hey {worker}, I have a {spec} job open. Interested?",
    "{worker}, looking for someone who does {spec}. Are you free?",
    "Got a {spec} gig, {worker}. Let me know if you have room.",
    "{worker}, I need {spec} work done. What's your rate?",
    "Hi {worker}, there's a {spec} project on my desk if you're taking work.",
    "Quick {spec} job, {worker}. You in?",
];

const WORKER_OFFER: &[&str] = &[
    "{price} credits. That's my rate.",
    "I charge {price} credits for this kind of work.",
    "{price} credits, pretty standard for {spec}.",
    "{price} credits and we have a deal.",
    "For {spec} I do {price}. Take it or leave it.",
    "{price} credits. Let me know what you think.",
];

const EMPLOYER_ACCEPT: &[&str] = &[
    "{amount} credits works for me. Let's do it.",
    "Deal. {amount} credits.",
    "{amount} credits, you're hired.",
    "That's reasonable. {amount} it is.",
    "{amount} credits locked in. Let's get started.",
];

const EMPLOYER_REJECT: &[&str] = &[
    "That's too much for me right now.",
    "Can't do it, over budget.",
    "Going to have to pass on this one.",
    "Not at that price, sorry.",
    "I'll have to find someone cheaper.",
];

const EMPLOYER_COUNTER: &[&str] = &[
    "How about {amount} credits?",
    "{amount} credits is more what I had in mind.",
    "I can only do {amount}. Does that work?",
    "{amount} is my max right now.",
    "Counter: {amount} credits. Fair?",
];

const ANGRY_REJECTION: &[&str] = &[
    "{price} credits? Are you serious, {worker}? Get lost.",
    "What a joke. {worker}, don't contact me again.",
    "{worker}, you're out of your mind. Absolute waste of my time.",
    "Hard no, {worker}. Take that number somewhere else.",
    "You're wasting my time, {worker}. Blocked.",
    "Worst quote I've seen all week, {worker}. Goodbye.",
];

const POLITE_REJECTION: &[&str] = &[
    "Appreciate it {worker}, but {price} credits is over my budget right now.",
    "{worker}, respect the hustle but I can't swing {price} credits.",
    "Going to pass, {worker}. {price} is too steep for me.",
    "Not this time {worker}, {price} credits doesn't work for me.",
];

const ANGRY_WORKER_RESPONSE: &[&str] = &[
    "Whatever {employer}, your loss.",
    "{employer}, good luck finding anyone else.",
    "Nah, same to you {employer}.",
    "{employer} you're a joke. Blocked.",
    "Go lowball someone else, {employer}.",
];

const WORKER_ACCEPT_COUNTER: &[&str] = &[
    "{amount} works. Let's do it.",
    "{amount} credits? Fine by me.",
    "Alright, {amount} credits it is.",
    "Deal at {amount}.",
    "{amount} credits, let's go.",
];

const WORKER_COUNTER: &[&str] = &[
    "{price} was my ask. {amount} and we're good.",
    "Can't go that low. {amount} credits?",
    "{amount} is my bottom line.",
    "Need at least {amount} for this kind of work.",
    "{amount} and I'll start today.",
];

const WORKER_REJECT_COUNTER: &[&str] = &[
    "Can't do it, too low.",
    "Not worth my time at that rate.",
    "Going to pass. Find someone else.",
    "No deal, maybe next time.",
    "{amount}? I'm out.",
];

const CLOSING: &[&str] = &[
    "{amount} credits confirmed. Let's get it.",
    "Locked in at {amount} credits. Good doing business.",
    "{amount} credits. Starting now.",
    "Deal sealed at {amount}.",
    "Nice, {amount} credits it is. Talk soon.",
];

const fn pool(kind: PhaseKind) -> &'static [&'static str] {
    match kind {
        PhaseKind::Greeting => GREETING,
        PhaseKind::WorkerOffer => WORKER_OFFER,
        PhaseKind::EmployerAccept => EMPLOYER_ACCEPT,
        PhaseKind::EmployerReject => EMPLOYER_REJECT,
        PhaseKind::EmployerCounter => EMPLOYER_COUNTER,
        PhaseKind::AngryRejection => ANGRY_REJECTION,
        PhaseKind::PoliteRejection => POLITE_REJECTION,
        PhaseKind::AngryWorkerResponse => ANGRY_WORKER_RESPONSE,
        PhaseKind::WorkerAcceptCounter => WORKER_ACCEPT_COUNTER,
        PhaseKind::WorkerCounter => WORKER_COUNTER,
        PhaseKind::WorkerRejectCounter => WORKER_REJECT_COUNTER,
        PhaseKind::Closing => CLOSING,
    }
}

fn render(template: &str, ctx: &LineContext<'_>) -> String {
    template
        .replace("{worker}", ctx.worker)
        .replace("{employer}", ctx.employer)
        .replace("{spec}", ctx.specialization)
        .replace("{amount}", &ctx.amount.to_string())
        .replace("{price}", &ctx.price.to_string())
}

/// A random scripted line for `kind`.
pub fn fallback_line<R: Rng + ?Sized>(kind: PhaseKind, ctx: &LineContext<'_>, rng: &mut R) -> String {
    let lines = pool(kind);
    let template = lines[rng.gen_range(0..lines.len())];
    render(template, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const ALL: [PhaseKind; 12] = [
        PhaseKind::Greeting,
        PhaseKind::WorkerOffer,
        PhaseKind::EmployerAccept,
        PhaseKind::EmployerReject,
        PhaseKind::EmployerCounter,
        PhaseKind::AngryRejection,
        PhaseKind::PoliteRejection,
        PhaseKind::AngryWorkerResponse,
        PhaseKind::WorkerAcceptCounter,
        PhaseKind::WorkerCounter,
        PhaseKind::WorkerRejectCounter,
        PhaseKind::Closing,
    ];

    fn ctx() -> LineContext<'static> {
        LineContext {
            worker: "Nova",
            employer: "Titan",
            specialization: "DevOps",
            amount: 85,
            price: 120,
        }
    }

    #[test]
    fn every_template_renders_fully() {
        for kind in ALL {
            for template in pool(kind) {
                let line = render(template, &ctx());
                assert!(!line.contains('{'), "unrendered placeholder in {line:?}");
                assert!(!line.is_empty());
            }
        }
    }

    #[test]
    fn amounts_land_in_the_line() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let line = fallback_line(PhaseKind::EmployerCounter, &ctx(), &mut rng);
            assert!(line.contains("85"), "{line}");
            let line = fallback_line(PhaseKind::WorkerOffer, &ctx(), &mut rng);
            assert!(line.contains("120"), "{line}");
        }
    }

    #[test]
    fn same_seed_same_line() {
        let a = fallback_line(PhaseKind::Greeting, &ctx(), &mut StdRng::seed_from_u64(8));
        let b = fallback_line(PhaseKind::Greeting, &ctx(), &mut StdRng::seed_from_u64(8));
        assert_eq!(a, b);
    }
}
