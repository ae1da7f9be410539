//! 리전 선택과 리소스 이름 생성
//!
//! 리전은 허용 목록에서 무작위로 뽑아 용량 충돌을 분산합니다. 두 리전이
//! 필요한 시나리오는 첫 리전을 먼저 뽑고, 두 번째는 첫 리전과 다를 때까지
//! 다시 뽑습니다 (허용 목록에 서로 다른 리전이 2개 이상이면 기대 O(1)회).
//!
//! 순수 함수는 `Rng`를 인자로 받으므로 테스트에서 시드를 고정할 수 있습니다.
//! [`NameGenerator`]는 실행 중 생성한 접두어를 모두 예약하여, 병렬로 도는
//! 시나리오끼리 워크스페이스나 작업 디렉토리 이름이 겹치지 않게 합니다.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vpngw_core::types::Region;

use crate::error::ScenarioError;

/// base-62 문자 집합
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// 접두어 토큰 길이
pub const PREFIX_TOKEN_LEN: usize = 6;

/// 사전 리소스 접두어 라벨
pub const PREREQUISITE_LABEL: &str = "ex";

/// 사전 공유 키 접두어
pub const PRESHARED_KEY_PREFIX: &str = "ps-key-";

/// 사전 공유 키 토큰 길이
pub const PRESHARED_KEY_TOKEN_LEN: usize = 3;

/// 길이 `len`의 base-62 토큰을 생성합니다.
pub fn unique_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

/// 소문자 토큰 (리소스 이름용)
pub fn lower_unique_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    unique_id(rng, len).to_ascii_lowercase()
}

/// 허용 목록에서 리전 하나를 뽑습니다.
pub fn pick_region<R: Rng + ?Sized>(
    rng: &mut R,
    regions: &[Region],
) -> Result<Region, ScenarioError> {
    if regions.is_empty() {
        return Err(ScenarioError::RegionSelection(
            "region allow-list is empty".to_owned(),
        ));
    }
    Ok(regions[rng.gen_range(0..regions.len())].clone())
}

/// 서로 다른 두 리전을 뽑습니다.
pub fn pick_distinct_pair<R: Rng + ?Sized>(
    rng: &mut R,
    regions: &[Region],
) -> Result<(Region, Region), ScenarioError> {
    let distinct: HashSet<&Region> = regions.iter().collect();
    if distinct.len() < 2 {
        return Err(ScenarioError::RegionSelection(format!(
            "need at least 2 distinct regions, allow-list has {}",
            distinct.len()
        )));
    }
    let first = pick_region(rng, regions)?;
    loop {
        let second = pick_region(rng, regions)?;
        if second != first {
            return Ok((first, second));
        }
    }
}

/// 실행 단위 이름 생성기
///
/// 여러 시나리오 태스크가 `Arc`로 공유합니다.
#[derive(Debug)]
pub struct NameGenerator {
    rng: Mutex<StdRng>,
    reserved: Mutex<HashSet<String>>,
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NameGenerator {
    /// OS 엔트로피로 시드한 생성기
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// 고정 시드 생성기 (재현 가능한 테스트용)
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            reserved: Mutex::new(HashSet::new()),
        }
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserved(&self) -> MutexGuard<'_, HashSet<String>> {
        self.reserved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `"{label}-{6자리 소문자 토큰}"` 형식의 고유 접두어
    ///
    /// 이미 발급된 접두어와 겹치면 다시 뽑습니다.
    pub fn prefix(&self, label: &str) -> String {
        loop {
            let candidate = format!(
                "{label}-{}",
                lower_unique_id(&mut *self.rng(), PREFIX_TOKEN_LEN)
            );
            if self.reserved().insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// 사전 리소스 스택용 접두어 (`ex-xxxxxx`)
    pub fn prerequisite_prefix(&self) -> String {
        self.prefix(PREREQUISITE_LABEL)
    }

    /// `"ps-key-{3자리 토큰}"` 형식의 사전 공유 키
    pub fn preshared_key(&self) -> String {
        format!(
            "{PRESHARED_KEY_PREFIX}{}",
            unique_id(&mut *self.rng(), PRESHARED_KEY_TOKEN_LEN)
        )
    }

    pub fn region(&self, regions: &[Region]) -> Result<Region, ScenarioError> {
        pick_region(&mut *self.rng(), regions)
    }

    pub fn region_pair(&self, regions: &[Region]) -> Result<(Region, Region), ScenarioError> {
        pick_distinct_pair(&mut *self.rng(), regions)
    }

    /// 지금까지 발급한 접두어 수
    pub fn issued(&self) -> usize {
        self.reserved().len()
    }

    /// 접두어가 이 생성기에서 발급되었는지 여부
    pub fn is_reserved(&self, prefix: &str) -> bool {
        self.reserved().contains(prefix)
    }
}
