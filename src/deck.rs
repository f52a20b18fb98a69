//! Card packs and the draw piles built from them.
//!
//! Cards are drawn without replacement. Once the draw pile runs dry the
//! discard pile is shuffled back in, so a card is only ever in one place:
//! a hand, the draw pile, or the discard pile.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{ConfigError, ConfigResult};
use crate::types::{BlackCard, WhiteCard, HAND_SIZE};

#[derive(Debug, Clone, PartialEq)]
pub struct Deck<T> {
    draw_pile: Vec<T>,
    discard_pile: Vec<T>,
}

impl<T> Default for Deck<T> {
    fn default() -> Self {
        Self {
            draw_pile: Vec::new(),
            discard_pile: Vec::new(),
        }
    }
}

impl<T> Deck<T> {
    /// Build a deck in the given order. Callers shuffle with [`Deck::shuffle`].
    pub fn new(cards: Vec<T>) -> Self {
        Self {
            draw_pile: cards,
            discard_pile: Vec::new(),
        }
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.draw_pile.shuffle(rng);
    }

    /// Take the top card, recycling the discard pile when the draw pile is empty
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<T> {
        if self.draw_pile.is_empty() && !self.discard_pile.is_empty() {
            tracing::debug!(
                "Draw pile exhausted, reshuffling {} discarded cards",
                self.discard_pile.len()
            );
            self.draw_pile.append(&mut self.discard_pile);
            self.draw_pile.shuffle(rng);
        }
        self.draw_pile.pop()
    }

    pub fn discard(&mut self, card: T) {
        self.discard_pile.push(card);
    }

    pub fn remaining(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn discarded(&self) -> usize {
        self.discard_pile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draw_pile.is_empty() && self.discard_pile.is_empty()
    }

    /// Every card in the deck, draw pile first
    pub fn cards(&self) -> impl Iterator<Item = &T> {
        self.draw_pile.iter().chain(self.discard_pile.iter())
    }
}

/// Prompt card as authored in a pack file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackBlackCard {
    pub text: String,
    #[serde(default = "default_pick")]
    pub pick: usize,
}

fn default_pick() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardPack {
    pub name: String,
    pub black: Vec<PackBlackCard>,
    pub white: Vec<String>,
}

/// Load card packs from a JSON file holding an array of packs
pub fn load_packs(path: &Path) -> ConfigResult<Vec<CardPack>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::CardPacks(format!("{}: {}", path.display(), e)))?;
    let packs: Vec<CardPack> = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::CardPacks(format!("{}: {}", path.display(), e)))?;

    if packs.is_empty() {
        return Err(ConfigError::CardPacks(format!(
            "{}: no card packs defined",
            path.display()
        )));
    }

    // A prompt asking for more cards than a hand holds can never be answered
    for pack in &packs {
        if let Some(card) = pack.black.iter().find(|c| c.pick > HAND_SIZE) {
            return Err(ConfigError::CardPacks(format!(
                "{}: \"{}\" in pack {} asks for {} cards, hands hold {}",
                path.display(),
                card.text,
                pack.name,
                card.pick,
                HAND_SIZE
            )));
        }
    }

    tracing::info!("Loaded {} card packs from {}", packs.len(), path.display());
    Ok(packs)
}

/// Small pack used when no pack file is configured
pub fn builtin_packs() -> Vec<CardPack> {
    let black = [
        ("What's that smell?", 1),
        ("I got 99 problems but ____ ain't one.", 1),
        ("What ended my last relationship?", 1),
        ("____. That's how I want to die.", 1),
        ("What's my secret power?", 1),
        ("____ + ____ = ____.", 3),
        ("Step 1: ____. Step 2: ____. Step 3: Profit.", 2),
        ("What never fails to liven up the party?", 1),
    ];
    let white = [
        "A lifetime of sadness.",
        "Being on fire.",
        "A disappointing birthday party.",
        "Puppies!",
        "Grandma's secret recipe.",
        "An awkward high five.",
        "Forgetting the Alamo.",
        "The Rapture.",
        "A suspiciously large sandwich.",
        "A windmill full of corpses.",
        "Poor life choices.",
        "Dying of dysentery.",
        "Free samples.",
        "An oversized lollipop.",
        "Sudden poop explosion disease.",
        "Vigorous jazz hands.",
        "A micropig wearing a tiny raincoat.",
        "The inevitable heat death of the universe.",
        "Passive-aggressive Post-it notes.",
        "Crippling debt.",
        "A bag of magic beans.",
        "Soup that is too hot.",
        "Dead parents.",
        "Flying snakes.",
        "Being fabulous.",
        "A tiny horse.",
        "Eating the last known bison.",
        "Mime school.",
        "An endless stream of diarrhea.",
        "Wearing underwear inside-out to avoid doing laundry.",
        "A good sniff.",
        "Raptor attacks.",
        "A sternly worded letter.",
        "Nicolas Cage.",
        "Pretending to care.",
        "Accidentally replying all.",
        "Karaoke night gone wrong.",
        "A mopey zoo lion.",
        "Authentic Mexican cuisine.",
        "Flightless birds.",
    ];

    vec![CardPack {
        name: "Carousal Starter".to_string(),
        black: black
            .iter()
            .map(|(text, pick)| PackBlackCard {
                text: text.to_string(),
                pick: *pick,
            })
            .collect(),
        white: white.iter().map(|s| s.to_string()).collect(),
    }]
}

/// Build shuffled decks from the enabled packs. An empty selection enables every pack.
pub fn build_decks<R: Rng + ?Sized>(
    packs: &[CardPack],
    enabled: &[usize],
    rng: &mut R,
) -> (Deck<BlackCard>, Deck<WhiteCard>) {
    let selected: Vec<(usize, &CardPack)> = packs
        .iter()
        .enumerate()
        .filter(|(i, _)| enabled.is_empty() || enabled.contains(i))
        .collect();

    let black = selected
        .iter()
        .flat_map(|(pack, p)| {
            p.black.iter().enumerate().map(move |(index, c)| BlackCard {
                text: c.text.clone(),
                pick: c.pick.clamp(1, HAND_SIZE),
                pack: *pack,
                index,
            })
        })
        .collect();

    let white = selected
        .iter()
        .flat_map(|(pack, p)| {
            p.white.iter().enumerate().map(move |(index, text)| WhiteCard {
                text: text.clone(),
                pack: *pack,
                index,
            })
        })
        .collect();

    let mut black_deck = Deck::new(black);
    let mut white_deck = Deck::new(white);
    black_deck.shuffle(rng);
    white_deck.shuffle(rng);
    (black_deck, white_deck)
}
