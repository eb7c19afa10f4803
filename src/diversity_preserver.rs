use crate::diversity::DiversityModel;
use crate::error::EngineError;
use crate::genetic_algorithm::{EvaluateFn, Fitness, Genotype};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fmt::Debug;

pub type MemberId = u64;

#[derive(Clone, Debug)]
struct Member<T> {
    id: MemberId,
    genotype: T,
    // Sum of squared scores against every other member
    squared_row: f64,
}

// A member taken out by a selection, with the scores it had
#[derive(Clone, Debug)]
struct Removed<T> {
    position: usize,
    member: Member<T>,
    scores: Vec<(MemberId, f64)>,
}

// What the last selection changed
#[derive(Clone, Debug)]
struct Journal<T> {
    inserted: Option<MemberId>,
    removed: Option<Removed<T>>,
    last_inserted: Option<MemberId>,
    last_removed: Option<MemberId>,
}

fn pair_key(a: MemberId, b: MemberId) -> (MemberId, MemberId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Cached pairwise scores of the current population, carried from one
/// generation to the next.
#[derive(Clone, Debug)]
pub struct DiversityPreserver<T> {
    members: Vec<Member<T>>,
    scores: HashMap<(MemberId, MemberId), f64>,
    squared_sum: f64,
    next_id: MemberId,
    last_inserted: Option<MemberId>,
    last_removed: Option<MemberId>,
    journal: Option<Journal<T>>,
    updates_since_resum: usize,
    first: bool,
}

impl<T> Default for DiversityPreserver<T> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            scores: HashMap::new(),
            squared_sum: 0.0,
            next_id: 0,
            last_inserted: None,
            last_removed: None,
            journal: None,
            updates_since_resum: 0,
            first: true,
        }
    }
}

impl<T: Genotype> DiversityPreserver<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores every pair of `genes` from scratch and returns a warm preserver.
    pub fn prime(genes: &[T], model: &DiversityModel<T>) -> Self {
        let mut preserver = Self {
            first: false,
            ..Self::default()
        };
        for genotype in genes {
            preserver.push(genotype.clone(), model);
        }
        preserver.last_inserted = None;
        preserver
    }

    pub fn is_cold(&self) -> bool {
        self.first
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn genes(&self) -> Vec<T> {
        self.members.iter().map(|m| m.genotype.clone()).collect()
    }

    pub fn last_inserted(&self) -> Option<MemberId> {
        self.last_inserted
    }

    pub fn last_removed(&self) -> Option<MemberId> {
        self.last_removed
    }

    pub fn cached_pairs(&self) -> usize {
        self.scores.len()
    }

    pub fn cached_score(&self, i: usize, j: usize) -> Option<f64> {
        let a = self.members.get(i)?;
        let b = self.members.get(j)?;
        self.scores.get(&pair_key(a.id, b.id)).copied()
    }

    /// Cached scores in the same row-major order as [`DiversityModel::pair_scores`].
    pub fn cached_scores(&self) -> Vec<f64> {
        let n = self.members.len();
        let mut scores = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                if let Some(score) = self.cached_score(i, j) {
                    scores.push(score);
                }
            }
        }
        scores
    }

    pub fn diversity(&self, model: &DiversityModel<T>) -> f64 {
        model.aggregate(self.squared_sum, self.members.len())
    }

    fn push(&mut self, genotype: T, model: &DiversityModel<T>) -> MemberId {
        let id = self.next_id;
        self.next_id += 1;

        let mut squared_row = 0.0;
        for member in self.members.iter_mut() {
            let score = model.pairwise(&member.genotype, &genotype);
            let squared = score * score;
            member.squared_row += squared;
            squared_row += squared;
            self.scores.insert(pair_key(member.id, id), score);
        }

        self.squared_sum += squared_row;
        self.members.push(Member {
            id,
            genotype,
            squared_row,
        });

        id
    }

    fn remove_at(&mut self, position: usize) -> Removed<T> {
        let member = self.members.remove(position);
        let mut scores = Vec::with_capacity(self.members.len());
        for other in self.members.iter_mut() {
            if let Some(score) = self.scores.remove(&pair_key(other.id, member.id)) {
                other.squared_row -= score * score;
                scores.push((other.id, score));
            }
        }
        self.squared_sum -= member.squared_row;
        Removed {
            position,
            member,
            scores,
        }
    }

    fn reinsert(&mut self, removed: Removed<T>) {
        let Removed {
            position,
            mut member,
            scores,
        } = removed;
        let scores: HashMap<MemberId, f64> = scores.into_iter().collect();

        member.squared_row = 0.0;
        for other in self.members.iter_mut() {
            if let Some(&score) = scores.get(&other.id) {
                let squared = score * score;
                other.squared_row += squared;
                member.squared_row += squared;
                self.scores.insert(pair_key(other.id, member.id), score);
            }
        }

        self.squared_sum += member.squared_row;
        let position = position.min(self.members.len());
        self.members.insert(position, member);
    }

    // The running sums pick up rounding error on every subtraction, so they
    // are rebuilt from the stored scores once per `len` updates.
    fn note_update(&mut self) {
        self.updates_since_resum += 1;
        if self.updates_since_resum >= self.members.len() {
            self.resum();
        }
    }

    fn resum(&mut self) {
        let n = self.members.len();
        let mut rows = vec![0.0; n];
        let mut squared_sum = 0.0;
        for i in 0..n {
            for j in i + 1..n {
                let squared = self.cached_score(i, j).map_or(0.0, |score| score * score);
                rows[i] += squared;
                rows[j] += squared;
                squared_sum += squared;
            }
        }

        for (member, row) in self.members.iter_mut().zip(rows) {
            member.squared_row = row;
        }
        self.squared_sum = squared_sum;
        self.updates_since_resum = 0;
    }

    fn check_sync(&self, parents: &[T]) -> Result<(), EngineError> {
        let in_sync = self.members.len() == parents.len()
            && self
                .members
                .iter()
                .zip(parents)
                .all(|(member, parent)| &member.genotype == parent);

        if in_sync {
            Ok(())
        } else {
            Err(EngineError::StaleDiversityState)
        }
    }

    // Candidates are scanned in shuffled order so ties do not favour
    // insertion order; the first strict maximum wins.
    fn removal_position(&self, model: &DiversityModel<T>, rng: &mut StdRng) -> usize {
        let remaining = self.members.len() - 1;
        let mut order: Vec<usize> = (0..self.members.len()).collect();
        order.shuffle(rng);

        let mut best_position = order[0];
        let mut best_diversity = f64::NEG_INFINITY;
        for position in order {
            let diversity = model.aggregate(
                self.squared_sum - self.members[position].squared_row,
                remaining,
            );
            if diversity > best_diversity {
                best_diversity = diversity;
                best_position = position;
            }
        }

        best_position
    }

    /// Adds `offspring` to `parents` and, once the candidate set exceeds
    /// `target_size`, removes the member whose exclusion maximizes diversity.
    /// A cold preserver is primed from `parents` first.
    pub fn select(
        mut self,
        parents: &[T],
        offspring: T,
        model: &DiversityModel<T>,
        target_size: usize,
        rng: &mut StdRng,
    ) -> Result<Self, EngineError> {
        if parents.len() > target_size {
            return Err(EngineError::CandidateCountMismatch {
                expected: target_size + 1,
                actual: parents.len() + 1,
            });
        }

        if self.first {
            self = Self::prime(parents, model);
        } else {
            self.check_sync(parents)?;
        }

        let mut journal = Journal {
            inserted: None,
            removed: None,
            last_inserted: self.last_inserted,
            last_removed: self.last_removed,
        };

        let inserted = self.push(offspring, model);
        self.last_inserted = Some(inserted);
        journal.inserted = Some(inserted);

        if self.members.len() > target_size {
            let position = self.removal_position(model, rng);
            let removed = self.remove_at(position);
            self.last_removed = Some(removed.member.id);
            journal.removed = Some(removed);
        }

        self.journal = Some(journal);
        self.note_update();
        Ok(self)
    }

    pub fn select_quality_gated<L: Fitness>(
        mut self,
        parents: &[T],
        offspring: T,
        model: &DiversityModel<T>,
        target_size: usize,
        gate: &QualityGate<T, L>,
        rng: &mut StdRng,
    ) -> Result<Self, EngineError> {
        if !gate.admits(&offspring) {
            self.journal = Some(Journal {
                inserted: None,
                removed: None,
                last_inserted: self.last_inserted,
                last_removed: self.last_removed,
            });
            return Ok(self);
        }
        self.select(parents, offspring, model, target_size, rng)
    }

    /// Undoes the last selection without scoring anything. Returns false
    /// when there is no selection to undo.
    pub fn revert(&mut self) -> bool {
        let Some(journal) = self.journal.take() else {
            return false;
        };

        if let Some(inserted) = journal.inserted {
            if let Some(position) = self.members.iter().position(|m| m.id == inserted) {
                self.remove_at(position);
            }
        }
        if let Some(removed) = journal.removed {
            if Some(removed.member.id) != journal.inserted {
                self.reinsert(removed);
            }
        }

        self.last_inserted = journal.last_inserted;
        self.last_removed = journal.last_removed;
        self.note_update();
        true
    }
}

/// Admits an offspring only when its fitness reaches `alpha * optimum`.
#[derive(Clone)]
pub struct QualityGate<T, L> {
    evaluate: EvaluateFn<T, L>,
    optimum: f64,
    alpha: f64,
}

impl<T, L: Fitness> QualityGate<T, L> {
    pub fn new(evaluate: EvaluateFn<T, L>, optimum: f64, alpha: f64) -> Self {
        Self {
            evaluate,
            optimum,
            alpha,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.optimum * self.alpha
    }

    pub fn admits(&self, offspring: &T) -> bool {
        (self.evaluate)(std::slice::from_ref(offspring))
            .first()
            .map(|&fitness| fitness.into() >= self.threshold())
            .unwrap_or(false)
    }
}

impl<T, L> Debug for QualityGate<T, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityGate")
            .field("optimum", &self.optimum)
            .field("alpha", &self.alpha)
            .finish_non_exhaustive()
    }
}

/// Survivor selector owning the diversity cache of one population.
#[derive(Clone, Debug)]
pub struct DiversitySelector<T, L> {
    model: DiversityModel<T>,
    target_size: usize,
    gate: Option<QualityGate<T, L>>,
    preserver: DiversityPreserver<T>,
}

impl<T: Genotype, L: Fitness> DiversitySelector<T, L> {
    pub fn new(model: DiversityModel<T>, target_size: usize) -> Self {
        Self {
            model,
            target_size,
            gate: None,
            preserver: DiversityPreserver::new(),
        }
    }

    pub fn with_quality_gate(mut self, gate: QualityGate<T, L>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn model(&self) -> &DiversityModel<T> {
        &self.model
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn preserver(&self) -> &DiversityPreserver<T> {
        &self.preserver
    }

    /// Undoes the last selection in O(mu).
    pub fn revert(&mut self) -> bool {
        self.preserver.revert()
    }

    // The next selection rebuilds the cache from scratch
    pub fn reset(&mut self) {
        self.preserver = DiversityPreserver::new();
    }

    pub fn diversity(&self) -> Option<f64> {
        (!self.preserver.is_cold()).then(|| self.preserver.diversity(&self.model))
    }

    pub fn select(
        &mut self,
        parents: &[T],
        mut offspring: Vec<T>,
        rng: &mut StdRng,
    ) -> Result<Vec<T>, EngineError> {
        if offspring.len() != 1 {
            return Err(EngineError::OffspringCountMismatch {
                actual: offspring.len(),
            });
        }
        let child = offspring.swap_remove(0);

        // A failed selection leaves the cache cold.
        let state = std::mem::take(&mut self.preserver);
        let state = match &self.gate {
            Some(gate) => state.select_quality_gated(
                parents,
                child,
                &self.model,
                self.target_size,
                gate,
                rng,
            )?,
            None => state.select(parents, child, &self.model, self.target_size, rng)?,
        };

        let genes = if state.is_cold() {
            parents.to_vec()
        } else {
            state.genes()
        };
        self.preserver = state;

        Ok(genes)
    }
}
