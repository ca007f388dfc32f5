mod invariants;
mod live;
mod scenarios;
