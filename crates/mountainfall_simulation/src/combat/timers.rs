//! Per-entity one-shot timers
//!
//! Единый примитив ожидания для всего combat core: recovery, combo window,
//! parry/riposte windows, stagger, i-frames и regen delay ResourcePool.
//!
//! # Architecture
//!
//! ```text
//! advance(dt)          → clock += dt
//! while pop_due()      → handler(kind) (может schedule/cancel)
//! settle()             → cursor = clock
//! ```
//!
//! Handler выполняется "во время" своего deadline: `schedule()` внутри
//! handler'а отсчитывает задержку от deadline сработавшего таймера, а не от
//! конца тика. Поэтому цепочки (recovery → combo close) не дрейфуют от
//! размера шага симуляции.
//!
//! Часы в f64 (как `Duration` внутри bevy `Time`): за часы сессии f32 теряет
//! точность на шаге 1/60. Задержки и интервалы остаются f32.

/// Один запланированный callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTimer<K> {
    pub kind: K,
    pub deadline: f64,
    seq: u64,
}

/// Список (deadline, kind), упорядоченный по deadline, затем по порядку schedule
#[derive(Debug, Clone)]
pub struct Timers<K> {
    entries: Vec<ScheduledTimer<K>>,
    clock: f64,
    cursor: f64,
    next_seq: u64,
}

impl<K> Default for Timers<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            clock: 0.0,
            cursor: 0.0,
            next_seq: 0,
        }
    }
}

impl<K: Copy + PartialEq> Timers<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Текущее время (внутри handler'а = deadline сработавшего таймера)
    pub fn now(&self) -> f64 {
        self.cursor
    }

    /// Секунд прошло с момента `since` (значение из `now()`)
    pub fn elapsed_since(&self, since: f64) -> f32 {
        (self.cursor - since) as f32
    }

    /// Запланировать `kind` через `delay` секунд. Существующий таймер того же
    /// kind заменяется (one-shot, не стек).
    pub fn schedule(&mut self, kind: K, delay: f32) {
        self.cancel(kind);
        let entry = ScheduledTimer {
            kind,
            deadline: self.cursor + f64::from(delay.max(0.0)),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.push(entry);
    }

    /// Returns true если таймер был запланирован
    pub fn cancel(&mut self, kind: K) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.kind != kind);
        self.entries.len() != before
    }

    pub fn cancel_where(&mut self, mut predicate: impl FnMut(K) -> bool) {
        self.entries.retain(|entry| !predicate(entry.kind));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_scheduled(&self, kind: K) -> bool {
        self.entries.iter().any(|entry| entry.kind == kind)
    }

    /// Оставшееся время до срабатывания
    pub fn remaining(&self, kind: K) -> Option<f32> {
        self.entries
            .iter()
            .find(|entry| entry.kind == kind)
            .map(|entry| (entry.deadline - self.cursor).max(0.0) as f32)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn advance(&mut self, dt: f32) {
        self.clock += f64::from(dt.max(0.0));
    }

    /// Самый ранний просроченный таймер (удаляется из списка).
    ///
    /// Cursor переводится на его deadline.
    pub fn pop_due(&mut self) -> Option<K> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.deadline <= self.clock)
            .min_by(|(_, a), (_, b)| {
                a.deadline
                    .total_cmp(&b.deadline)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(index, _)| index)?;

        let entry = self.entries.remove(index);
        self.cursor = self.cursor.max(entry.deadline);
        Some(entry.kind)
    }

    /// Завершить dispatch: cursor догоняет clock
    pub fn settle(&mut self) {
        self.cursor = self.clock;
    }
}
