// Lua sources for the Redis store.
//
// Lock scripts return nil on acquisition, otherwise the holder's remaining lease in
// milliseconds (-1 when the lock is free but another waiter is ahead in the fair queue).

/// KEYS: hold. ARGV: lease ms, owner.
pub(super) const REENTRANT_LOCK: &str = r#"
if redis.call('exists', KEYS[1]) == 0 or redis.call('hexists', KEYS[1], ARGV[2]) == 1 then
	redis.call('hincrby', KEYS[1], ARGV[2], 1)
	redis.call('pexpire', KEYS[1], ARGV[1])
	return nil
end
return redis.call('pttl', KEYS[1])
"#;

/// KEYS: hold, queue, timeout. ARGV: lease ms, owner, waiter timeout ms.
pub(super) const FAIR_LOCK: &str = r#"
redis.replicate_commands()

local clock = redis.call('time')
local now = tonumber(clock[1]) * 1000 + math.floor(tonumber(clock[2]) / 1000)

while true do
	local head = redis.call('lindex', KEYS[2], 0)
	if not head then
		break
	end
	local stale_at = redis.call('zscore', KEYS[3], head)
	if stale_at and tonumber(stale_at) > now then
		break
	end
	redis.call('lpop', KEYS[2])
	redis.call('zrem', KEYS[3], head)
end

if redis.call('exists', KEYS[1]) == 1 then
	if redis.call('hexists', KEYS[1], ARGV[2]) == 1 then
		redis.call('hincrby', KEYS[1], ARGV[2], 1)
		redis.call('pexpire', KEYS[1], ARGV[1])
		return nil
	end
else
	local head = redis.call('lindex', KEYS[2], 0)
	if not head or head == ARGV[2] then
		redis.call('lrem', KEYS[2], 0, ARGV[2])
		redis.call('zrem', KEYS[3], ARGV[2])
		redis.call('hset', KEYS[1], ARGV[2], 1)
		redis.call('pexpire', KEYS[1], ARGV[1])
		return nil
	end
end

if not redis.call('zscore', KEYS[3], ARGV[2]) then
	redis.call('rpush', KEYS[2], ARGV[2])
end
redis.call('zadd', KEYS[3], now + tonumber(ARGV[3]), ARGV[2])
redis.call('pexpire', KEYS[2], ARGV[3])
redis.call('pexpire', KEYS[3], ARGV[3])

local ttl = redis.call('pttl', KEYS[1])
if ttl < 0 then
	return -1
end
return ttl
"#;

/// KEYS: hold. ARGV: owner. Returns nil when not held, otherwise the holds left.
pub(super) const UNLOCK: &str = r#"
if redis.call('hexists', KEYS[1], ARGV[1]) == 0 then
	return nil
end
local remaining = redis.call('hincrby', KEYS[1], ARGV[1], -1)
if remaining > 0 then
	return remaining
end
redis.call('del', KEYS[1])
return 0
"#;

/// KEYS: queue, timeout. ARGV: owner.
pub(super) const ABANDON: &str = r#"
redis.call('lrem', KEYS[1], 0, ARGV[1])
redis.call('zrem', KEYS[2], ARGV[1])
return 1
"#;

/// KEYS: counter. ARGV: window ms. Returns the post-increment count.
pub(super) const INCREMENT: &str = r#"
local count = redis.call('incr', KEYS[1])
if count == 1 or redis.call('pttl', KEYS[1]) < 0 then
	redis.call('pexpire', KEYS[1], ARGV[1])
end
return count
"#;
